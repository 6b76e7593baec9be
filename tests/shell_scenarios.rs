//! End-to-end shell scenarios driven through `Shell::dispatch` against the
//! headless backend

use std::collections::HashSet;

use tempfile::tempdir;
use v128_shell::backend::{Command, HeadlessBackend};
use v128_shell::config::{BindingConfig, ShellConfig};
use v128_shell::input::{Action, InputEvent, KeyEvent, KeyState, Modifiers};
use v128_shell::shell::{
    Anchor, ClientId, Layer, Margins, OutputDescriptor, OutputId, PlacementRequest, Rect, Shell,
    ShellEvent, SurfaceDescriptor, SurfaceId,
};
use v128_shell::ShellError;

const RETURN: u32 = 0xff0d;
const BRACKETRIGHT: u32 = 0x5d;

fn output(id: u64, name: &str, width: u32, height: u32) -> OutputDescriptor {
    OutputDescriptor {
        id: OutputId(id),
        ..OutputDescriptor::new(name, width, height)
    }
}

fn surface(id: u64, output: OutputId, layer: Layer) -> SurfaceDescriptor {
    SurfaceDescriptor {
        id: SurfaceId(id),
        client: ClientId(id),
        layer,
        output,
        geometry: Rect::new(0, 0, 800, 600),
        focusable: layer != Layer::Background,
        grab_on_click: false,
    }
}

fn start(config: &ShellConfig, outputs: Vec<OutputDescriptor>) -> Shell<HeadlessBackend> {
    let mut shell = Shell::start(config, HeadlessBackend::new(outputs)).expect("shell starts");
    shell.backend_mut().take_commands();
    shell
}

#[test]
fn test_spawn_binding_is_not_forwarded() {
    let logs = tempdir().unwrap();
    let config = ShellConfig {
        log_dir: Some(logs.path().to_path_buf()),
        bindings: vec![BindingConfig::new(
            "Super+Return",
            Action::Spawn {
                command: "true".to_string(),
            },
        )],
        ..ShellConfig::default()
    };
    let o1 = OutputId(1);
    let mut shell = start(&config, vec![output(1, "O1", 1920, 1080)]);

    // S1 mapped normal/focusable on O1 becomes focused
    shell.dispatch(ShellEvent::SurfaceMapped(surface(1, o1, Layer::Normal)));
    assert_eq!(shell.focus().focused(), Some(SurfaceId(1)));

    // Super+Return spawns and is swallowed, press and release
    for state in [KeyState::Pressed, KeyState::Released] {
        shell.dispatch(ShellEvent::Input(InputEvent::Key(KeyEvent {
            time: 0,
            keycode: 28,
            keysym: RETURN,
            modifiers: Modifiers::LOGO,
            state,
        })));
    }
    assert_eq!(shell.launcher().exec_count(), 1);
    assert!(logs.path().join("subprogram.0.log").exists());
    assert!(!shell
        .backend()
        .commands()
        .iter()
        .any(|c| matches!(c, Command::ForwardKey(..))));

    // An unbound key still reaches S1
    shell.dispatch(ShellEvent::Input(InputEvent::Key(KeyEvent {
        time: 1,
        keycode: 30,
        keysym: 0x61,
        modifiers: Modifiers::empty(),
        state: KeyState::Pressed,
    })));
    assert!(matches!(
        shell.backend().commands().last(),
        Some(Command::ForwardKey(SurfaceId(1), _))
    ));

    // S1 unmapped with nothing else around
    shell.dispatch(ShellEvent::SurfaceUnmapped(SurfaceId(1)));
    assert_eq!(shell.focus().focused(), None);
    assert_eq!(shell.backend().commands().last(), Some(&Command::SetFocus(None)));
}

#[test]
fn test_focus_survives_output_removal() {
    let (o1, o2) = (OutputId(1), OutputId(2));
    let mut shell = start(
        &ShellConfig::default(),
        vec![output(1, "O1", 1920, 1080), output(2, "O2", 1920, 1080)],
    );
    shell.dispatch(ShellEvent::SurfaceMapped(surface(1, o1, Layer::Normal)));
    assert_eq!(shell.focus().focused(), Some(SurfaceId(1)));

    shell.dispatch(ShellEvent::OutputRemoved(o1));

    assert_eq!(shell.stack().get(SurfaceId(1)).unwrap().output, o2);
    assert_eq!(shell.focus().focused(), Some(SurfaceId(1)));
    assert_eq!(shell.stack().topmost_focusable(o2), Some(SurfaceId(1)));
    assert!(!shell
        .backend()
        .commands()
        .iter()
        .any(|c| matches!(c, Command::SetFocus(_))));
}

#[test]
fn test_output_removal_leaves_no_dangling_output() {
    let (o1, o2, o3) = (OutputId(1), OutputId(2), OutputId(3));
    let mut shell = start(
        &ShellConfig::default(),
        vec![
            output(1, "O1", 1920, 1080),
            output(2, "O2", 1280, 720),
            output(3, "O3", 1280, 720),
        ],
    );
    shell.dispatch(ShellEvent::SurfaceMapped(surface(1, o1, Layer::Normal)));
    shell.dispatch(ShellEvent::SurfaceMapped(surface(2, o2, Layer::Normal)));
    shell.dispatch(ShellEvent::SurfaceMapped(surface(3, o2, Layer::Background)));
    shell.dispatch(ShellEvent::SurfaceMapped(surface(4, o3, Layer::Overlay)));

    for removed in [o2, o1, o3] {
        shell.dispatch(ShellEvent::OutputRemoved(removed));
        let live: HashSet<OutputId> = shell.outputs().list_outputs().iter().map(|o| o.id).collect();
        for (id, surface) in shell.stack().iter() {
            assert!(live.contains(&surface.output), "{:?} on dead output", id);
        }
        assert!(shell.focus().is_consistent(shell.stack()));
    }

    // Nothing left to move to
    assert!(shell.stack().is_empty());
    assert_eq!(shell.focus().focused(), None);
}

#[test]
fn test_exclusive_zones_conflict_only_on_the_same_edge() {
    let o1 = OutputId(1);
    let mut shell = start(&ShellConfig::default(), vec![output(1, "O1", 1920, 1080)]);
    let request = |surface: u64, anchor: Anchor, size: (u32, u32)| PlacementRequest {
        surface: SurfaceId(surface),
        output: o1,
        anchor,
        margin: Margins::default(),
        exclusive_zone: 32,
        size,
    };

    shell.dispatch(ShellEvent::LayerShellRequest(request(
        10,
        Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
        (0, 32),
    )));
    shell.dispatch(ShellEvent::LayerShellRequest(request(
        11,
        Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
        (0, 32),
    )));
    shell.dispatch(ShellEvent::LayerShellRequest(request(
        12,
        Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT,
        (0, 32),
    )));

    let placements = shell.placements();
    assert_eq!(placements.geometry_of(SurfaceId(10)), Some(Rect::new(0, 0, 1920, 32)));
    assert!(placements.is_rejected(SurfaceId(11)));
    assert_eq!(placements.geometry_of(SurfaceId(11)), None);
    assert_eq!(placements.geometry_of(SurfaceId(12)), Some(Rect::new(0, 1048, 1920, 32)));
    assert_eq!(placements.usable_area(o1, (1920, 1080)), Rect::new(0, 32, 1920, 1016));
}

#[test]
fn test_resolving_twice_is_idempotent() {
    let o1 = OutputId(1);
    let mut shell = start(&ShellConfig::default(), vec![output(1, "O1", 1920, 1080)]);
    let request = PlacementRequest {
        surface: SurfaceId(10),
        output: o1,
        anchor: Anchor::LEFT | Anchor::TOP | Anchor::BOTTOM,
        margin: Margins::new(4, 0, 4, 8),
        exclusive_zone: 48,
        size: (48, 0),
    };

    shell.dispatch(ShellEvent::LayerShellRequest(request.clone()));
    let first = shell.placements().geometry_of(SurfaceId(10));
    shell.dispatch(ShellEvent::LayerShellRequest(request));
    let second = shell.placements().geometry_of(SurfaceId(10));

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn test_start_without_outputs_is_fatal() {
    let result = Shell::start(&ShellConfig::default(), HeadlessBackend::new(Vec::new()));
    match result {
        Err(e) => {
            assert_eq!(e, ShellError::NoOutputAvailable);
            assert!(e.is_fatal());
        }
        Ok(_) => panic!("shell started without outputs"),
    }
}

#[test]
fn test_extreme_margins_do_not_stop_the_shell() {
    let o1 = OutputId(1);
    let mut shell = start(&ShellConfig::default(), vec![output(1, "O1", 1920, 1080)]);
    shell.dispatch(ShellEvent::LayerShellRequest(PlacementRequest {
        surface: SurfaceId(10),
        output: o1,
        anchor: Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
        margin: Margins::new(i32::MAX, i32::MAX, 0, i32::MAX),
        exclusive_zone: i32::MAX,
        size: (0, 32),
    }));

    assert!(shell.is_running());
    let geometry = shell.placements().geometry_of(SurfaceId(10)).unwrap();
    assert!(geometry.right() <= 1920 && geometry.bottom() <= 1080);
}

#[test]
fn test_default_cycle_binding_reaches_every_window() {
    let o1 = OutputId(1);
    let mut shell = start(&ShellConfig::default(), vec![output(1, "O1", 1920, 1080)]);
    for id in 1..=3 {
        shell.dispatch(ShellEvent::SurfaceMapped(surface(id, o1, Layer::Normal)));
    }

    let mut focused = HashSet::new();
    for time in 0..3 {
        for state in [KeyState::Pressed, KeyState::Released] {
            shell.dispatch(ShellEvent::Input(InputEvent::Key(KeyEvent {
                time,
                keycode: 27,
                keysym: BRACKETRIGHT,
                modifiers: Modifiers::ALT,
                state,
            })));
        }
        focused.insert(shell.focus().focused().unwrap());
    }
    assert_eq!(focused, (1..=3).map(SurfaceId).collect());
}
