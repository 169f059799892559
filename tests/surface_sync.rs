use std::sync::Arc;
use std::time::Duration;

use midi_surface::configuration::{Capabilities, Settings};
use midi_surface::dialog::{DialogContent, DialogInput};
use midi_surface::host::hub::HostHub;
use midi_surface::layout::stubs::StaticResolver;
use midi_surface::layout::LayoutId;
use midi_surface::midi::control::ControlValue;
use midi_surface::midi::controller::stubs::Recording;
use midi_surface::midi::mapping::StatusType;
use midi_surface::render::headless::HeadlessRenderer;
use midi_surface::surface::menu::MenuOption;
use midi_surface::surface::runtime::TokioRuntime;
use midi_surface::surface::{Collaborators, Mailbox, Surface, SurfaceEvent};
use midi_surface::sync::StateKey;

struct View {
    renderer: Arc<HeadlessRenderer>,
    surface: Surface<TokioRuntime>,
}

struct Rig {
    midi: Arc<Recording>,
    hub: Arc<HostHub>,
    views: Vec<View>,
}

async fn rig(clients: usize) -> Rig {
    let settings = Arc::new(Settings {
        layouts: vec!["mixer".into(), "pads".into()],
        ..Settings::default()
    });
    let resolver = Arc::new(
        StaticResolver::new()
            .with_full_layout("mixer", 800, 540, &settings.controls, true)
            .with_full_layout("pads", 400, 400, &settings.controls, false),
    );
    let midi = Arc::new(Recording::default());
    let hub = HostHub::new(midi.clone(), None);
    let runtime = Arc::new(TokioRuntime::current());
    let capabilities = Capabilities {
        plugin: true,
        ..Capabilities::default()
    };

    let mut views = Vec::new();
    for _ in 0..clients {
        let renderer = Arc::new(HeadlessRenderer::new());
        let mailbox = Mailbox::new();
        let link = hub.connect(mailbox.listener());
        let surface = Surface::create(
            settings.clone(),
            capabilities,
            Collaborators {
                resolver: resolver.clone(),
                renderer: renderer.clone(),
                host: Arc::new(link),
            },
            runtime.clone(),
            mailbox,
        )
        .await
        .unwrap();
        views.push(View { renderer, surface });
    }
    Rig { midi, hub, views }
}

impl Rig {
    /// Handles queued events on every view until all mailboxes are empty.
    async fn pump(&mut self) -> usize {
        let mut total = 0;
        loop {
            let mut handled = 0;
            for view in self.views.iter_mut() {
                handled += view.surface.run_pending().await;
            }
            if handled == 0 {
                return total;
            }
            total += handled;
        }
    }

    /// Lets `ms` of timers elapse, then pumps.
    async fn settle(&mut self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        self.pump().await;
    }

    async fn send(&mut self, client: usize, event: SurfaceEvent) {
        self.views[client].surface.handle(event).await;
        self.pump().await;
    }

    fn config(&self) -> String {
        self.hub.state(StateKey::Config).unwrap_or_default()
    }

    fn midi_bytes(&self) -> Vec<[u8; 3]> {
        self.midi.sent().into_iter().map(Into::into).collect()
    }
}

#[tokio::test(start_paused = true)]
async fn views_agree_on_first_run_without_write_loops() {
    let mut rig = rig(3).await;
    rig.pump().await;

    let config = rig.config();
    assert!(config.contains(r#""layout":"mixer""#));
    for view in &rig.views {
        assert_eq!(
            view.surface.layout().active_id(),
            Some(&LayoutId::from("mixer"))
        );
        assert_eq!(view.surface.layout().swaps(), 1);
        assert_eq!(
            view.surface.sync().configuration().cloned(),
            rig.views[0].surface.sync().configuration().cloned()
        );
    }
    // Quiet once everyone has converged.
    assert_eq!(rig.pump().await, 0);
    assert_eq!(rig.config(), config);
}

#[tokio::test(start_paused = true)]
async fn control_changes_reach_midi_and_other_views() {
    let mut rig = rig(2).await;
    rig.pump().await;

    assert!(rig.views[0]
        .renderer
        .simulate_input(&"f-01".into(), ControlValue::Number(0.5)));
    assert!(rig.views[0]
        .renderer
        .simulate_input(&"b-02".into(), ControlValue::Bool(true)));
    assert!(rig.views[0]
        .renderer
        .simulate_input(&"b-02".into(), ControlValue::Bool(false)));
    rig.pump().await;

    assert_eq!(
        rig.midi_bytes(),
        vec![[0xB0, 0x20, 63], [0x90, 0x11, 127], [0x80, 0x11, 0]]
    );
    let other = &rig.views[1];
    assert_eq!(
        other.renderer.control_value(&"f-01".into()),
        Some(ControlValue::Number(0.5))
    );
    assert_eq!(
        other.surface.sync().ui_state().get(&"b-02".into()),
        Some(ControlValue::Bool(false))
    );
    assert_eq!(
        rig.hub.state(StateKey::Ui).as_deref(),
        Some(r#"{"b-02":false,"f-01":0.5}"#)
    );
}

#[tokio::test(start_paused = true)]
async fn late_view_restores_persisted_state() {
    let mut rig = rig(1).await;
    rig.pump().await;
    rig.views[0]
        .renderer
        .simulate_input(&"k-07".into(), ControlValue::Number(0.9));
    rig.send(0, SurfaceEvent::ToggleCollapsed).await;

    let renderer = Arc::new(HeadlessRenderer::new());
    let mailbox = Mailbox::new();
    let link = rig.hub.connect(mailbox.listener());
    let resolver = Arc::new(StaticResolver::new().with_full_layout(
        "mixer",
        800,
        540,
        &Settings::default().controls,
        true,
    ));
    let mut late = Surface::create(
        Arc::new(Settings::default()),
        Capabilities::default(),
        Collaborators {
            resolver,
            renderer: renderer.clone(),
            host: Arc::new(link),
        },
        Arc::new(TokioRuntime::current()),
        mailbox,
    )
    .await
    .unwrap();
    late.run_pending().await;

    assert_eq!(
        renderer.control_value(&"k-07".into()),
        Some(ControlValue::Number(0.9))
    );
    assert!(renderer.is_collapsed());
}

#[tokio::test(start_paused = true)]
async fn picking_a_layout_moves_every_view() {
    let mut rig = rig(2).await;
    rig.pump().await;

    rig.send(0, SurfaceEvent::Menu(MenuOption::Layout)).await;
    rig.settle(250).await;
    rig.send(0, SurfaceEvent::Dialog(DialogInput::SelectLayout("pads".into())))
        .await;
    rig.settle(150).await;

    assert!(rig.config().contains(r#""layout":"pads""#));
    for view in &rig.views {
        assert_eq!(
            view.surface.layout().active_id(),
            Some(&LayoutId::from("pads"))
        );
        assert_eq!(view.renderer.stylesheets(), vec![LayoutId::from("pads")]);
    }
}

#[tokio::test(start_paused = true)]
async fn reselecting_the_active_layout_commits_nothing() {
    let mut rig = rig(2).await;
    rig.pump().await;
    let before = rig.config();

    rig.send(0, SurfaceEvent::Menu(MenuOption::Layout)).await;
    rig.settle(250).await;
    rig.send(0, SurfaceEvent::Dialog(DialogInput::SelectLayout("mixer".into())))
        .await;
    rig.settle(150).await;

    assert!(rig.views[0].surface.dialogs().is_idle());
    assert_eq!(rig.config(), before);
    assert_eq!(rig.views[1].surface.layout().swaps(), 1);
    assert_eq!(rig.pump().await, 0);
}

#[tokio::test(start_paused = true)]
async fn mapping_edit_in_one_view_drives_midi_from_another() {
    let mut rig = rig(2).await;
    rig.pump().await;

    rig.send(0, SurfaceEvent::Menu(MenuOption::Midi)).await;
    assert!(matches!(
        rig.views[0].renderer.dialog(),
        Some(DialogContent::MidiMapping(_))
    ));
    rig.settle(250).await;
    rig.send(
        0,
        SurfaceEvent::Dialog(DialogInput::EditMapping {
            id: "b-01".into(),
            status_type: StatusType::ControlChange,
            channel: 1,
            index: 90,
        }),
    )
    .await;
    rig.send(0, SurfaceEvent::Dialog(DialogInput::Ok)).await;
    rig.settle(150).await;

    // The other view keeps its layout, only the mapping changed.
    assert_eq!(rig.views[1].surface.layout().swaps(), 1);
    rig.views[1]
        .renderer
        .simulate_input(&"b-01".into(), ControlValue::Bool(true));
    rig.pump().await;
    assert_eq!(rig.midi_bytes(), vec![[0xB1, 90, 127]]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_mapping_edit_changes_nothing() {
    let mut rig = rig(1).await;
    rig.pump().await;
    let before = rig.config();

    rig.send(0, SurfaceEvent::Menu(MenuOption::Midi)).await;
    rig.settle(250).await;
    rig.send(
        0,
        SurfaceEvent::Dialog(DialogInput::EditMapping {
            id: "k-01".into(),
            status_type: StatusType::ControlChange,
            channel: 4,
            index: 1,
        }),
    )
    .await;
    rig.send(0, SurfaceEvent::Dialog(DialogInput::ClickOutside)).await;
    rig.settle(150).await;

    assert!(rig.views[0].surface.dialogs().is_idle());
    assert_eq!(rig.config(), before);
}
