//! One connected view. All of its state is owned by a single actor that
//! handles one event at a time; timers post events back to the same mailbox.

use async_channel::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::configuration::{Capabilities, Settings};
use crate::dialog::editor::MappingEditor;
use crate::dialog::{DialogContent, DialogController, DialogInput, DialogOutcome, LayoutPicker};
use crate::extensions::option::OptionExt;
use crate::extensions::result::ResultExt;
use crate::host::hub::HubListener;
use crate::host::{HostEvent, InboundControlMessage, SharedHost};
use crate::layout::resource::SharedResolver;
use crate::layout::{LayoutError, LayoutId, LayoutManager};
use crate::midi::control::{ControlId, ControlValue, DescriptorTable};
use crate::midi::mapping;
use crate::render::{InputBinding, SharedRenderer, StatusLine};
use crate::router::status::{StatusDisplay, StatusTimer};
use crate::router::ControlEventRouter;
use crate::sync::{StateKey, SyncCoordinator, SyncEffect};

pub mod menu;
pub mod runtime;

use menu::MenuOption;
use runtime::Runtime;

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    StateChanged { key: StateKey, value: String },
    HostMessage(InboundControlMessage),
    ControlInput { id: ControlId, value: ControlValue },
    Menu(MenuOption),
    Dialog(DialogInput),
    ToggleCollapsed,
    /// The window changed size; the renderer knows the new one.
    ViewportResized,
    StatusTimer(StatusTimer),
    DialogTransitionEnded(u64),
    Shutdown,
}

impl From<HostEvent> for SurfaceEvent {
    fn from(event: HostEvent) -> Self {
        match event {
            HostEvent::StateChanged { key, value } => SurfaceEvent::StateChanged { key, value },
            HostEvent::Message(msg) => SurfaceEvent::HostMessage(msg),
        }
    }
}

/// Created before the surface so the host can start queueing state for it.
#[derive(Clone)]
pub struct Mailbox {
    sender: Sender<SurfaceEvent>,
    receiver: Receiver<SurfaceEvent>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Mailbox::new()
    }
}

impl Mailbox {
    pub fn new() -> Mailbox {
        let (sender, receiver) = async_channel::unbounded();
        Mailbox { sender, receiver }
    }

    pub fn sender(&self) -> Sender<SurfaceEvent> {
        self.sender.clone()
    }

    pub fn listener(&self) -> HubListener {
        Arc::new(self.sender.clone())
    }
}

/// External collaborators of a surface.
pub struct Collaborators {
    pub resolver: SharedResolver,
    pub renderer: SharedRenderer,
    pub host: SharedHost,
}

pub struct Surface<R: Runtime> {
    settings: Arc<Settings>,
    capabilities: Capabilities,
    descriptors: Arc<DescriptorTable>,
    host: SharedHost,
    sync: SyncCoordinator,
    layout: LayoutManager,
    router: ControlEventRouter,
    status: StatusDisplay,
    dialogs: DialogController,
    runtime: Arc<R>,
    mailbox: Mailbox,
}

pub struct SurfaceActor {
    pub running_loop: JoinHandle<()>,
    pub mailbox: Sender<SurfaceEvent>,
}

impl SurfaceActor {
    pub async fn shutdown(self) -> anyhow::Result<()> {
        // Already stopped if the mailbox is closed.
        let _ = self.mailbox.send(SurfaceEvent::Shutdown).await;
        self.running_loop.await?;
        Ok(())
    }
}

impl<R: Runtime + Send + Sync + 'static> Surface<R> {
    /// Builds a fully initialized surface. In dev mode the default layout is
    /// shown right away instead of waiting for persisted state.
    pub async fn create(
        settings: Arc<Settings>,
        capabilities: Capabilities,
        collaborators: Collaborators,
        runtime: Arc<R>,
        mailbox: Mailbox,
    ) -> Result<Surface<R>, LayoutError> {
        let Collaborators {
            resolver,
            renderer,
            host,
        } = collaborators;
        let descriptors = Arc::new(settings.controls.clone());

        let mut surface = Surface {
            sync: SyncCoordinator::new(descriptors.clone(), settings.default_layout.clone()),
            layout: LayoutManager::new(resolver, renderer.clone(), host.clone(), capabilities),
            router: ControlEventRouter::new(descriptors.clone(), host.clone()),
            status: StatusDisplay::new(renderer.clone(), settings.status.clone()),
            dialogs: DialogController::new(renderer, host.clone(), settings.dialog.clone()),
            settings,
            capabilities,
            descriptors,
            host,
            runtime,
            mailbox,
        };

        if capabilities.dev {
            let default_layout = surface.settings.default_layout.clone();
            let on_input = surface.input_binding();
            surface
                .layout
                .activate(&default_layout, surface.sync.ui_state(), on_input)
                .await?;
        }
        Ok(surface)
    }

    pub fn sender(&self) -> Sender<SurfaceEvent> {
        self.mailbox.sender()
    }

    pub fn sync(&self) -> &SyncCoordinator {
        &self.sync
    }

    pub fn layout(&self) -> &LayoutManager {
        &self.layout
    }

    pub fn dialogs(&self) -> &DialogController {
        &self.dialogs
    }

    pub fn start(mut self) -> SurfaceActor {
        let mailbox = self.mailbox.sender();
        let inbox = self.mailbox.receiver.clone();
        let runtime = self.runtime.clone();

        let running_loop = runtime.spawn(async move {
            while let Ok(event) = inbox.recv().await {
                if !self.handle(event).await {
                    break;
                }
            }
            tracing::debug!("Surface loop stopped");
        });

        SurfaceActor {
            running_loop,
            mailbox,
        }
    }

    /// Handles whatever is queued right now without waiting for more.
    pub async fn run_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.mailbox.receiver.try_recv() {
            handled += 1;
            if !self.handle(event).await {
                break;
            }
        }
        handled
    }

    /// Returns false once the surface should stop.
    pub async fn handle(&mut self, event: SurfaceEvent) -> bool {
        match event {
            SurfaceEvent::StateChanged { key, value } => {
                let effects = self.sync.state_changed(key, &value);
                self.apply(effects).await;
            }
            SurfaceEvent::HostMessage(msg) => {
                self.router
                    .on_host_message(&mut self.sync, self.layout.registry(), msg)
                    .log_failure("Host control message");
            }
            SurfaceEvent::ControlInput { id, value } => self.on_control_input(id, value),
            SurfaceEvent::Menu(option) => self.on_menu(option).await,
            SurfaceEvent::Dialog(input) => {
                if let Some(Some(transition)) = self.dialogs.input(input).log_failure("Dialog input") {
                    self.schedule(
                        transition.after,
                        SurfaceEvent::DialogTransitionEnded(transition.serial),
                    );
                }
            }
            SurfaceEvent::DialogTransitionEnded(serial) => {
                if let Some(Some(outcome)) = self
                    .dialogs
                    .transition_ended(serial)
                    .log_failure("Dialog transition")
                {
                    self.commit(outcome).await;
                }
            }
            SurfaceEvent::ToggleCollapsed => {
                if let Some(effects) = self
                    .sync
                    .commit_config(|config| config.collapsed = !config.collapsed)
                    .log_failure("Collapse toggle")
                {
                    self.apply(effects).await;
                }
            }
            SurfaceEvent::ViewportResized => self.layout.on_viewport_resized(),
            SurfaceEvent::StatusTimer(timer) => {
                if let Some((after, next)) = self.status.on_timer(timer) {
                    let handle = self.schedule(after, SurfaceEvent::StatusTimer(next));
                    self.status.arm(handle);
                }
            }
            SurfaceEvent::Shutdown => return false,
        }
        true
    }

    async fn apply(&mut self, effects: Vec<SyncEffect>) {
        for effect in effects {
            match effect {
                SyncEffect::Persist { key, blob } => self.host.set_state(key, blob),
                SyncEffect::FirstRender => {
                    let Some(config) = self.sync.configuration().cloned() else {
                        continue;
                    };
                    self.layout.set_collapsed(config.collapsed);
                    self.activate(config.layout).await;
                }
                SyncEffect::ActivateLayout(layout) => self.activate(layout).await,
                SyncEffect::MappingChanged => {
                    // Encoding reads the mapping on every change.
                    tracing::debug!("MIDI mapping reloaded");
                }
                SyncEffect::CollapsedChanged(collapsed) => self.layout.set_collapsed(collapsed),
                SyncEffect::RestoreUi => self.layout.restore(self.sync.ui_state()),
            }
        }
    }

    async fn activate(&mut self, layout: LayoutId) {
        let on_input = self.input_binding();
        let result = self
            .layout
            .activate(&layout, self.sync.ui_state(), on_input.clone())
            .await;
        let Err(e) = result else {
            return;
        };
        tracing::warn!("{e}");
        self.show_error(e.to_string());

        // Never leave the view empty when a stored layout has gone away.
        let default_layout = self.settings.default_layout.clone();
        if self.layout.active().is_none() && layout != default_layout {
            tracing::info!("Falling back to `{default_layout}`");
            self.layout
                .activate(&default_layout, self.sync.ui_state(), on_input)
                .await
                .log_failure("Default layout activation");
        }
    }

    fn on_control_input(&mut self, id: ControlId, value: ControlValue) {
        let Some(msg) = self
            .router
            .on_control_changed(&mut self.sync, id, value)
            .log_failure("Control change")
        else {
            return;
        };

        let show_status = self
            .layout
            .active()
            .map(|active| active.show_status)
            .unwrap_or(false);
        if !show_status {
            return;
        }
        let line = self
            .layout
            .registry()
            .get(&msg.control_id)
            .and_then(|handle| self.router.status_for(&handle.name, &msg.control_id, value));
        if let Some(line) = line {
            self.show_status(line);
        }
    }

    async fn on_menu(&mut self, option: MenuOption) {
        if !option.is_available(&self.capabilities) {
            tracing::debug!("Menu option {option:?} is not available here");
            return;
        }
        if !self.dialogs.is_idle() {
            tracing::debug!("A dialog is already showing, ignoring {option:?}");
            return;
        }

        let content = match option {
            MenuOption::About => DialogContent::About {
                version: self.settings.product_version.clone(),
                homepage: self.settings.homepage.clone(),
            },
            MenuOption::Layout => {
                // The stored layout, which can differ from the active one
                // after a fallback, so picking the active layout repairs it.
                let current = self
                    .sync
                    .configuration()
                    .map(|config| &config.layout)
                    .or_else(|| self.layout.active_id())
                    .unwrap_or(&self.settings.default_layout)
                    .clone();
                DialogContent::LayoutPicker(LayoutPicker::new(
                    self.settings.pickable_layouts(),
                    current,
                ))
            }
            MenuOption::Midi => {
                let config = self
                    .sync
                    .configuration()
                    .inspect_none(|| tracing::warn!("MIDI mapping is not loaded yet"));
                let Some(config) = config else {
                    return;
                };
                DialogContent::MidiMapping(MappingEditor::new(&self.descriptors, &config.map))
            }
            MenuOption::Network => match self.host.network_details().await {
                Ok(details) => DialogContent::Network(details),
                Err(e) => {
                    tracing::warn!("Network details unavailable: {e}");
                    self.show_error(format!("Network details unavailable: {e}"));
                    return;
                }
            },
        };

        if let Some(transition) = self.dialogs.open(content).log_failure("Opening dialog") {
            self.schedule(
                transition.after,
                SurfaceEvent::DialogTransitionEnded(transition.serial),
            );
        }
    }

    async fn commit(&mut self, outcome: DialogOutcome) {
        let committed = match outcome {
            DialogOutcome::Mapping(edits) => {
                let descriptors = self.descriptors.clone();
                self.sync.commit_config(move |config| {
                    config.map = mapping::apply_edits(&descriptors, &config.map, edits)
                })
            }
            DialogOutcome::Layout(layout) => {
                tracing::info!("Layout `{layout}` selected");
                // Stored only once it is showing, a layout that fails to load
                // leaves the configuration untouched.
                let on_input = self.input_binding();
                let activated = self
                    .layout
                    .activate(&layout, self.sync.ui_state(), on_input)
                    .await;
                if let Err(e) = activated {
                    tracing::warn!("{e}");
                    self.show_error(e.to_string());
                    return;
                }
                self.sync.commit_config(move |config| config.layout = layout)
            }
        };
        if let Some(effects) = committed.log_failure("Configuration commit") {
            self.apply(effects).await;
        }
    }

    fn show_status(&mut self, line: StatusLine) {
        let (after, timer) = self.status.show(line);
        let handle = self.schedule(after, SurfaceEvent::StatusTimer(timer));
        self.status.arm(handle);
    }

    fn show_error(&mut self, text: String) {
        let (after, timer) = self.status.show_error(text);
        let handle = self.schedule(after, SurfaceEvent::StatusTimer(timer));
        self.status.arm(handle);
    }

    fn schedule(&self, after: Duration, event: SurfaceEvent) -> JoinHandle<()> {
        let mailbox = self.mailbox.sender();
        self.runtime.schedule_once(after, async move {
            mailbox
                .send(event)
                .await
                .map_err(|_| anyhow::anyhow!("surface mailbox is closed"))
        })
    }

    fn input_binding(&self) -> InputBinding {
        let mailbox = self.mailbox.sender();
        Arc::new(move |id, value| {
            if mailbox
                .try_send(SurfaceEvent::ControlInput { id, value })
                .is_err()
            {
                tracing::debug!("Surface is gone, dropping control input");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::stubs::RecordingHost;
    use crate::host::NetworkDetails;
    use crate::layout::stubs::StaticResolver;
    use crate::render::headless::HeadlessRenderer;
    use runtime::TokioRuntime;

    struct Fixture {
        resolver: Arc<StaticResolver>,
        renderer: Arc<HeadlessRenderer>,
        host: Arc<RecordingHost>,
        surface: Surface<TokioRuntime>,
    }

    async fn fixture(capabilities: Capabilities, host: RecordingHost) -> Fixture {
        let settings = Arc::new(Settings {
            layouts: vec!["mixer".into(), "pads".into()],
            ..Settings::default()
        });
        let resolver = Arc::new(
            StaticResolver::new()
                .with_full_layout("mixer", 800, 540, &settings.controls, true)
                .with_full_layout("pads", 400, 300, &settings.controls, false),
        );
        let renderer = Arc::new(HeadlessRenderer::new());
        let host = Arc::new(host);
        let surface = Surface::create(
            settings,
            capabilities,
            Collaborators {
                resolver: resolver.clone(),
                renderer: renderer.clone(),
                host: host.clone(),
            },
            Arc::new(TokioRuntime::current()),
            Mailbox::new(),
        )
        .await
        .unwrap();
        Fixture {
            resolver,
            renderer,
            host,
            surface,
        }
    }

    async fn deliver(f: &mut Fixture, key: StateKey, value: &str) {
        f.surface
            .handle(SurfaceEvent::StateChanged {
                key,
                value: value.to_string(),
            })
            .await;
    }

    /// Lets scheduled timers fire and handles what they posted.
    async fn settle(f: &mut Fixture, time: u64) {
        tokio::time::sleep(Duration::from_millis(time)).await;
        f.surface.run_pending().await;
    }

    #[tokio::test(start_paused = true)]
    async fn renders_after_both_keys_then_routes_input() {
        let mut f = fixture(Capabilities::default(), RecordingHost::new()).await;
        deliver(&mut f, StateKey::Ui, r#"{"k-02":0.5}"#).await;
        assert!(f.surface.layout().active().is_none());

        deliver(&mut f, StateKey::Config, "").await;
        assert_eq!(
            f.surface.layout().active_id(),
            Some(&LayoutId::from("mixer"))
        );
        assert_eq!(
            f.renderer.control_value(&"k-02".into()),
            Some(ControlValue::Number(0.5))
        );
        // Defaults were synthesized and stored.
        assert!(f.host.last_state(StateKey::Config).is_some());

        assert!(f.renderer.simulate_input(&"k-01".into(), ControlValue::Number(1.0)));
        f.surface.run_pending().await;
        let sent = f.host.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data_byte.as_u8(), 127);

        settle(&mut f, 25).await;
        assert_eq!(f.renderer.status().unwrap().text, "Knob 1    100%");
        settle(&mut f, 1600).await;
        assert!(f.renderer.status().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dev_mode_shows_default_layout_immediately() {
        let f = fixture(
            Capabilities {
                dev: true,
                ..Capabilities::default()
            },
            RecordingHost::new(),
        )
        .await;
        assert_eq!(
            f.surface.layout().active_id(),
            Some(&LayoutId::from("mixer"))
        );
        assert_eq!(f.renderer.control_count(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn layout_picker_commits_and_swaps() {
        let mut f = fixture(Capabilities::default(), RecordingHost::new()).await;
        deliver(&mut f, StateKey::Config, "").await;
        deliver(&mut f, StateKey::Ui, "").await;

        f.surface.handle(SurfaceEvent::Menu(MenuOption::Layout)).await;
        settle(&mut f, 250).await;
        f.surface
            .handle(SurfaceEvent::Dialog(DialogInput::SelectLayout("pads".into())))
            .await;
        settle(&mut f, 150).await;

        assert_eq!(f.surface.layout().active_id(), Some(&LayoutId::from("pads")));
        assert_eq!(
            f.surface.sync().configuration().map(|c| c.layout.clone()),
            Some(LayoutId::from("pads"))
        );
        let stored = f.host.last_state(StateKey::Config).unwrap();
        assert!(stored.contains(r#""layout":"pads""#));
    }

    async fn pick_layout(f: &mut Fixture, layout: &str) {
        f.surface.handle(SurfaceEvent::Menu(MenuOption::Layout)).await;
        settle(f, 250).await;
        f.surface
            .handle(SurfaceEvent::Dialog(DialogInput::SelectLayout(layout.into())))
            .await;
        settle(f, 150).await;
    }

    fn stored_layout(f: &Fixture) -> Option<LayoutId> {
        f.surface.sync().configuration().map(|c| c.layout.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn broken_layout_pick_keeps_configuration() {
        let mut f = fixture(Capabilities::default(), RecordingHost::new()).await;
        deliver(&mut f, StateKey::Config, "").await;
        deliver(&mut f, StateKey::Ui, "").await;
        let before = f.host.last_state(StateKey::Config);
        f.resolver.break_layout("pads");

        pick_layout(&mut f, "pads").await;

        assert_eq!(f.surface.layout().active_id(), Some(&LayoutId::from("mixer")));
        assert_eq!(stored_layout(&f), Some(LayoutId::from("mixer")));
        assert_eq!(f.host.last_state(StateKey::Config), before);
        assert!(f.renderer.status().unwrap().error);
        assert!(f.surface.dialogs().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn picking_the_active_layout_repairs_a_stale_configuration() {
        let mut f = fixture(Capabilities::default(), RecordingHost::new()).await;
        f.resolver.break_layout("pads");
        deliver(&mut f, StateKey::Config, r#"{"layout":"pads"}"#).await;
        deliver(&mut f, StateKey::Ui, "").await;
        assert_eq!(f.surface.layout().active_id(), Some(&LayoutId::from("mixer")));
        assert_eq!(stored_layout(&f), Some(LayoutId::from("pads")));

        pick_layout(&mut f, "mixer").await;

        assert_eq!(stored_layout(&f), Some(LayoutId::from("mixer")));
        let stored = f.host.last_state(StateKey::Config).unwrap();
        assert!(stored.contains(r#""layout":"mixer""#));
        assert_eq!(f.surface.layout().swaps(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn plugin_only_menus_and_network_failure() {
        let mut f = fixture(Capabilities::default(), RecordingHost::new()).await;
        f.surface.handle(SurfaceEvent::Menu(MenuOption::Midi)).await;
        assert!(f.surface.dialogs().is_idle());

        let mut f = fixture(
            Capabilities {
                plugin: true,
                ..Capabilities::default()
            },
            RecordingHost::new(),
        )
        .await;
        f.surface.handle(SurfaceEvent::Menu(MenuOption::Network)).await;
        assert!(f.surface.dialogs().is_idle());
        assert!(f.renderer.status().unwrap().error);

        let details = NetworkDetails {
            addresses: vec!["10.0.0.2".to_string()],
            port: 49152,
        };
        let mut f = fixture(
            Capabilities {
                plugin: true,
                ..Capabilities::default()
            },
            RecordingHost::new().with_network(details.clone()),
        )
        .await;
        f.surface.handle(SurfaceEvent::Menu(MenuOption::Network)).await;
        assert_eq!(f.renderer.dialog(), Some(DialogContent::Network(details)));
    }

    #[tokio::test(start_paused = true)]
    async fn collapse_toggle_is_persisted() {
        let mut f = fixture(Capabilities::default(), RecordingHost::new()).await;
        deliver(&mut f, StateKey::Config, "").await;
        deliver(&mut f, StateKey::Ui, "").await;

        f.surface.handle(SurfaceEvent::ToggleCollapsed).await;
        assert!(f.renderer.is_collapsed());
        let stored = f.host.last_state(StateKey::Config).unwrap();
        assert!(stored.contains(r#""collapsed":true"#));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_stored_layout_falls_back_to_default() {
        let mut f = fixture(Capabilities::default(), RecordingHost::new()).await;
        deliver(&mut f, StateKey::Config, r#"{"layout":"retired"}"#).await;
        deliver(&mut f, StateKey::Ui, "").await;

        assert_eq!(
            f.surface.layout().active_id(),
            Some(&LayoutId::from("mixer"))
        );
        assert!(f.renderer.status().unwrap().error);
    }

    #[tokio::test(start_paused = true)]
    async fn started_actor_stops_on_shutdown() {
        let f = fixture(Capabilities::default(), RecordingHost::new()).await;
        let actor = f.surface.start();
        actor
            .mailbox
            .send(SurfaceEvent::StateChanged {
                key: StateKey::Config,
                value: String::new(),
            })
            .await
            .unwrap();
        actor.shutdown().await.unwrap();
        assert!(f.host.last_state(StateKey::Config).is_some());
    }
}
