//! Shell orchestrator
//!
//! Owns every shell component, routes each provider event to the component
//! responsible for it, and turns the changes they report into backend
//! commands. Component errors are logged and dropped here; only
//! [`Shell::start`] can fail.

use log::{debug, error, info, warn};
use serde::Deserialize;

use crate::backend::Backend;
use crate::config::ShellConfig;
use crate::error::{Result, ShellError};
use crate::input::{Action, Dispatch, InputEvent, InputRouter, KeybindingSet, RouteContext, TouchEvent};
use crate::launcher::Launcher;
use crate::shell::{
    FocusChange, FocusState, GrabChange, Layer, OutputDescriptor, OutputId, OutputRegistry,
    PlacementRequest, PlacementResolver, Rect, ShellEvent, Surface, SurfaceDescriptor, SurfaceId,
    SurfaceStack,
};

/// Geometry given to newly mapped windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowPlacement {
    /// Keep whatever the client asked for
    #[default]
    AsRequested,
    /// Cover the output's usable area
    FillOutput,
}

/// The shell: output layout, stacking, focus, input and layer-shell policy
/// on top of a [`Backend`]
pub struct Shell<B: Backend> {
    backend: B,
    outputs: OutputRegistry,
    stack: SurfaceStack,
    focus: FocusState,
    placements: PlacementResolver,
    router: InputRouter,
    launcher: Launcher,
    raise_on_focus: bool,
    window_placement: WindowPlacement,
    running: bool,
}

impl<B: Backend> Shell<B> {
    /// Build the shell from the backend's current outputs and run autostart
    /// commands.
    ///
    /// Fails with [`ShellError::NoOutputAvailable`] when the backend has no
    /// enabled output.
    pub fn start(config: &ShellConfig, backend: B) -> Result<Self> {
        let mut outputs = OutputRegistry::with_layout(config.output_layout());
        for descriptor in backend.outputs() {
            if let Err(e) = outputs.add_output(descriptor) {
                warn!("Ignoring output: {}", e);
            }
        }
        if outputs.enabled().next().is_none() {
            return Err(ShellError::NoOutputAvailable);
        }
        outputs.take_changes();

        let bindings = KeybindingSet::new(config.keybindings());
        info!(
            "Shell started with {} outputs and {} keybindings",
            outputs.len(),
            bindings.len()
        );

        let mut shell = Self {
            backend,
            outputs,
            stack: SurfaceStack::new(),
            focus: FocusState::new(config.focus_on_map),
            placements: PlacementResolver::new(),
            router: InputRouter::new(bindings, config.focus_follows_click),
            launcher: Launcher::new(config.log_dir.clone(), config.environment.clone()),
            raise_on_focus: config.raise_on_focus,
            window_placement: config.new_window_placement,
            running: true,
        };

        for command in &config.autostart {
            shell.spawn(command);
        }

        Ok(shell)
    }

    /// Handle one provider event to completion
    pub fn dispatch(&mut self, event: ShellEvent) {
        if !self.running {
            debug!("Shell stopped, ignoring {:?}", event);
            return;
        }
        debug!("Dispatching {:?}", event);

        let result = match event {
            ShellEvent::OutputAdded(descriptor) => self.output_added(descriptor),
            ShellEvent::OutputChanged(descriptor) => self.output_changed(descriptor),
            ShellEvent::OutputRemoved(id) => self.output_removed(id),
            ShellEvent::SurfaceMapped(descriptor) => self.surface_mapped(descriptor),
            ShellEvent::SurfaceUnmapped(id) => self.surface_unmapped(id),
            ShellEvent::Input(event) => {
                self.input(event);
                Ok(())
            }
            ShellEvent::LayerShellRequest(request) => self.layer_shell_request(request),
            ShellEvent::ActivationRequest(id) => self.activate(id),
        };
        match result {
            Err(e) if e.is_fatal() => {
                error!("{}", e);
                self.stop();
            }
            Err(e) => warn!("{}", e),
            Ok(()) => {}
        }

        self.reap_children();
        debug_assert!(self.focus.is_consistent(&self.stack));
    }

    /// Release focus and grab, forget all surfaces and placements and stop
    /// accepting events
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        let (focus, grab) = self.focus.clear();
        self.apply_grab(grab);
        self.apply_focus(focus, false);
        self.stack.clear();
        self.placements.clear();
        self.running = false;
        info!("Shell stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Collect exited subprograms
    pub fn reap_children(&mut self) {
        self.launcher.reap();
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    pub fn stack(&self) -> &SurfaceStack {
        &self.stack
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    pub fn placements(&self) -> &PlacementResolver {
        &self.placements
    }

    pub fn router(&self) -> &InputRouter {
        &self.router
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    // Outputs

    fn output_added(&mut self, descriptor: OutputDescriptor) -> Result<()> {
        let name = descriptor.name.clone();
        let id = self.outputs.add_output(descriptor)?;
        info!("Output {} added as {:?}", name, id);
        self.apply_output_changes();
        Ok(())
    }

    fn output_changed(&mut self, descriptor: OutputDescriptor) -> Result<()> {
        let id = descriptor.id;
        let was_enabled = self.outputs.is_enabled(id);
        self.outputs.update_output(id, descriptor)?;

        if was_enabled && !self.outputs.is_enabled(id) {
            info!("Output {:?} disabled", id);
            let fallback = self.outputs.fallback_for(id);
            self.evacuate(id, fallback);
        }
        self.apply_output_changes();
        Ok(())
    }

    fn output_removed(&mut self, id: OutputId) -> Result<()> {
        let fallback = self.outputs.fallback_for(id);
        let output = self.outputs.remove_output(id)?;
        info!("Output {} removed", output.name);
        self.evacuate(id, fallback);
        self.apply_output_changes();
        Ok(())
    }

    /// Move everything off an output that is going away, or unmap it when
    /// there is nowhere to go
    fn evacuate(&mut self, from: OutputId, fallback: Option<OutputId>) {
        let surfaces = self.stack.surfaces_on(from);
        let target = fallback.and_then(|to| self.output_size(to).ok().map(|size| (to, size)));

        match target {
            Some((to, size)) => {
                for id in surfaces {
                    if self.placements.output_of(id) == Some(from) {
                        continue;
                    }
                    match self.stack.move_to_output(id, to, size) {
                        Ok(geometry) => self.backend.set_geometry(id, geometry),
                        Err(e) => warn!("{}", e),
                    }
                }
                for (surface, result) in self.placements.retarget(from, to, size) {
                    self.apply_placement(surface, to, result);
                }
                self.refill_windows(to);
            }
            None => {
                warn!("No enabled output left, unmapping {} surfaces", surfaces.len());
                self.placements.drop_output(from);
                for id in surfaces.into_iter().rev() {
                    if let Err(e) = self.remove_surface(id) {
                        warn!("{}", e);
                    }
                }
            }
        }

        let change = self.focus.on_output_removed(&self.stack, from, fallback);
        self.apply_focus(change, false);
    }

    /// Re-resolve placements of every output whose geometry changed
    fn apply_output_changes(&mut self) {
        for id in self.outputs.take_changes() {
            if self.outputs.is_enabled(id) {
                self.reflow(id);
            }
        }
    }

    fn output_size(&self, id: OutputId) -> Result<(u32, u32)> {
        self.outputs
            .get(id)
            .filter(|output| output.enabled)
            .map(|output| output.logical_size())
            .ok_or(ShellError::UnknownOutput(id))
    }

    // Surfaces

    fn surface_mapped(&mut self, descriptor: SurfaceDescriptor) -> Result<()> {
        let id = descriptor.id;
        if self.placements.is_rejected(id) {
            info!("Not mapping {:?}: its placement was rejected", id);
            return Ok(());
        }

        let mut surface = Surface::from(descriptor);
        let requested = surface.geometry;
        if let Some(output) = self.placements.output_of(id) {
            surface.output = output;
        }
        let size = self.output_size(surface.output)?;

        if let Some(geometry) = self.placements.geometry_of(id) {
            surface.geometry = geometry;
        } else if surface.layer == Layer::Normal && self.window_placement == WindowPlacement::FillOutput {
            surface.geometry = self.placements.usable_area(surface.output, size);
        }

        let geometry = surface.geometry;
        self.stack.map(surface.clone())?;
        if geometry != requested {
            self.backend.set_geometry(id, geometry);
        }

        let change = self.focus.on_map(&surface);
        self.apply_focus(change, false);
        Ok(())
    }

    fn surface_unmapped(&mut self, id: SurfaceId) -> Result<()> {
        let rejected = self.placements.is_rejected(id);
        let placed_on = self.placements.remove(id);

        if self.stack.contains(id) {
            self.remove_surface(id)?;
        } else if !rejected && placed_on.is_none() {
            return Err(ShellError::UnknownSurface(id));
        }

        if let Some(output) = placed_on {
            self.reflow(output);
        }
        Ok(())
    }

    /// Drop a surface from the stack and move focus and grab off it
    fn remove_surface(&mut self, id: SurfaceId) -> Result<Surface> {
        let removed = self.stack.unmap(id)?;
        self.router.forget_surface(id);
        let (focus, grab) = self.focus.on_unmap(&self.stack, &removed);
        self.apply_grab(grab);
        self.apply_focus(focus, false);
        Ok(removed)
    }

    fn raise_surface(&mut self, id: SurfaceId) -> Result<()> {
        self.stack.raise(id)?;
        self.backend.raise(id);
        Ok(())
    }

    fn lower_surface(&mut self, id: SurfaceId) -> Result<()> {
        self.stack.lower(id)?;
        self.backend.lower(id);
        Ok(())
    }

    fn activate(&mut self, id: SurfaceId) -> Result<()> {
        let change = self.focus.request_focus(&self.stack, id)?;
        self.apply_focus(change, true);
        Ok(())
    }

    // Layer shell

    fn layer_shell_request(&mut self, request: PlacementRequest) -> Result<()> {
        let surface = request.surface;
        let output = request.output;
        let size = self.output_size(output)?;
        let placed_on = self.placements.output_of(surface);
        let previous = placed_on.filter(|o| *o != output);

        let result = self.placements.resolve(request, size);
        let outcome = match result {
            Ok(_) => {
                self.reflow(output);
                Ok(())
            }
            Err(e) => {
                if self.stack.contains(surface) {
                    self.remove_surface(surface)?;
                }
                // A rejected surface gives up the zone it held here
                if placed_on == Some(output) {
                    self.reflow(output);
                }
                Err(e)
            }
        };

        if let Some(previous) = previous {
            self.reflow(previous);
        }
        outcome
    }

    /// Re-resolve every placement of an output and push the new geometry
    fn reflow(&mut self, output: OutputId) {
        let Ok(size) = self.output_size(output) else {
            return;
        };
        for (surface, result) in self.placements.reflow(output, size) {
            self.apply_placement(surface, output, result);
        }
        self.refill_windows(output);
    }

    fn apply_placement(&mut self, surface: SurfaceId, output: OutputId, result: Result<Rect>) {
        let geometry = match result {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!("{}", e);
                if self.stack.contains(surface) {
                    if let Err(e) = self.remove_surface(surface) {
                        warn!("{}", e);
                    }
                }
                return;
            }
        };

        if let Some(current) = self.stack.get(surface) {
            if current.output == output && current.geometry == geometry {
                return;
            }
            if current.output != output {
                if let Ok(size) = self.output_size(output) {
                    if let Err(e) = self.stack.move_to_output(surface, output, size) {
                        warn!("{}", e);
                    }
                }
            }
            if let Err(e) = self.stack.set_geometry(surface, geometry) {
                warn!("{}", e);
            }
        }
        self.backend.set_geometry(surface, geometry);
    }

    /// Keep fill-output windows covering the usable area of `output`
    fn refill_windows(&mut self, output: OutputId) {
        if self.window_placement != WindowPlacement::FillOutput {
            return;
        }
        let Ok(size) = self.output_size(output) else {
            return;
        };
        let area = self.placements.usable_area(output, size);
        let windows: Vec<SurfaceId> = self
            .stack
            .surfaces_on(output)
            .into_iter()
            .filter(|id| {
                self.stack
                    .get(*id)
                    .is_some_and(|s| s.layer == Layer::Normal && s.geometry != area)
            })
            .collect();
        for id in windows {
            if self.stack.set_geometry(id, area).is_ok() {
                self.backend.set_geometry(id, area);
            }
        }
    }

    // Input

    fn input(&mut self, event: InputEvent) {
        let ctx = RouteContext {
            stack: &self.stack,
            outputs: &self.outputs,
            focus: &mut self.focus,
        };
        match self.router.route(event, ctx) {
            Dispatch::Action(action) => self.run_action(action),
            Dispatch::Key { surface, event } => self.backend.forward_key(surface, event),
            Dispatch::Pointer {
                surface,
                event,
                focus,
                grab,
            } => {
                self.apply_focus(focus, true);
                self.apply_grab(grab);
                self.backend.forward_pointer(surface, event);
            }
            Dispatch::Touch {
                surface,
                event,
                focus,
            } => {
                self.apply_focus(focus, true);
                self.backend.forward_touch(surface, event);
            }
            Dispatch::TouchCancel(surfaces) => {
                for surface in surfaces {
                    self.backend.forward_touch(surface, TouchEvent::Cancel);
                }
            }
            Dispatch::Dropped => {}
        }
    }

    fn run_action(&mut self, action: Action) {
        info!("Running {:?}", action);
        let focused = self.focus.focused();
        match action {
            Action::Spawn { command } => self.spawn(&command),
            Action::Close => match focused {
                Some(id) => self.backend.close(id),
                None => debug!("Nothing focused to close"),
            },
            Action::Raise => {
                if let Some(id) = focused {
                    if let Err(e) = self.raise_surface(id) {
                        warn!("{}", e);
                    }
                }
            }
            Action::CycleFocus => {
                if let Some(output) = self.current_output() {
                    let change = self.focus.cycle(&self.stack, output);
                    let previous = change.as_ref().and_then(|change| change.old);
                    self.apply_focus(change, true);
                    // The old front window goes to the back so the next
                    // cycle moves on to a window not yet visited
                    if let Some(previous) = previous.filter(|_| self.raise_on_focus) {
                        if let Err(e) = self.lower_surface(previous) {
                            warn!("{}", e);
                        }
                    }
                }
            }
            Action::MoveToNextOutput => {
                if let Some(id) = focused {
                    if let Err(e) = self.move_to_next_output(id) {
                        warn!("{}", e);
                    }
                }
            }
            Action::FocusNextOutput => {
                let next = self
                    .current_output()
                    .and_then(|output| self.outputs.enabled_after(output));
                if let Some(next) = next {
                    let change = self.focus.focus_output(&self.stack, next);
                    self.apply_focus(change, true);
                }
            }
            Action::Quit => self.stop(),
        }
    }

    fn move_to_next_output(&mut self, id: SurfaceId) -> Result<()> {
        let surface = self.stack.get(id).ok_or(ShellError::UnknownSurface(id))?;
        let layer = surface.layer;
        let Some(next) = self.outputs.enabled_after(surface.output) else {
            debug!("No other output to move {:?} to", id);
            return Ok(());
        };
        let size = self.output_size(next)?;

        let mut geometry = self.stack.move_to_output(id, next, size)?;
        if layer == Layer::Normal && self.window_placement == WindowPlacement::FillOutput {
            geometry = self.placements.usable_area(next, size);
            self.stack.set_geometry(id, geometry)?;
        }
        self.backend.set_geometry(id, geometry);
        self.backend.raise(id);

        // Remember the surface as the focus of its new output
        self.focus.request_focus(&self.stack, id)?;
        Ok(())
    }

    /// Output of the focused surface, else the one under the pointer, else
    /// the first enabled output
    fn current_output(&self) -> Option<OutputId> {
        let (x, y) = self.router.pointer().position();
        self.focus
            .focused()
            .and_then(|id| self.stack.get(id))
            .map(|surface| surface.output)
            .or_else(|| self.outputs.output_at(x, y))
            .or_else(|| self.outputs.enabled().next().map(|output| output.id))
    }

    // Commands

    fn apply_focus(&mut self, change: Option<FocusChange>, raise: bool) {
        let Some(change) = change else {
            return;
        };
        self.backend.set_focus(change.new);
        if let Some(id) = change.new.filter(|_| raise && self.raise_on_focus) {
            if let Err(e) = self.raise_surface(id) {
                warn!("{}", e);
            }
        }
    }

    fn apply_grab(&mut self, change: Option<GrabChange>) {
        if let Some(change) = change {
            self.backend.set_grab(change.new);
        }
    }

    fn spawn(&mut self, command: &str) {
        if let Err(e) = self.launcher.spawn(command) {
            warn!("{:#}", e);
        }
    }
}
