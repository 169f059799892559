use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use midi_surface::configuration::{self, Capabilities, Settings};
use midi_surface::dialog::DialogInput;
use midi_surface::host::hub::{HostHub, HubMidiSender};
use midi_surface::host::NetworkDetails;
use midi_surface::layout::resource::DirectoryResolver;
use midi_surface::layout::LayoutId;
use midi_surface::midi::control::{ControlId, ControlValue};
use midi_surface::midi::controller::stubs::JustPrint;
use midi_surface::render::headless::HeadlessRenderer;
use midi_surface::surface::menu::MenuOption;
use midi_surface::surface::runtime::TokioRuntime;
use midi_surface::surface::{Collaborators, Mailbox, Surface, SurfaceActor, SurfaceEvent};
use midi_surface::sync::StateKey;

/// Runs a plugin-side hub with a number of headless surfaces attached and
/// reads JSON commands from stdin, one per line.
#[derive(Parser, Debug)]
#[command(name = "midi-surface", version, about)]
struct Args {
    /// Product settings (YAML).
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Directory holding `<layout>.css` and `<layout>.yaml`.
    #[arg(long, default_value = "layouts")]
    layouts: PathBuf,
    /// Number of views connected to the hub.
    #[arg(long, default_value_t = 1)]
    clients: usize,
    #[arg(long)]
    plugin: bool,
    #[arg(long)]
    dev: bool,
    #[arg(long)]
    mobile: bool,
    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f64,
    /// Address reported by the network dialog. Repeatable.
    #[arg(long = "address")]
    addresses: Vec<String>,
    /// Port reported by the network dialog.
    #[arg(long)]
    port: Option<u16>,
    /// Send MIDI to the first output port whose name contains this.
    #[cfg(feature = "midir-output")]
    #[arg(long)]
    midi_port: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Command {
    Input {
        #[serde(default)]
        client: usize,
        id: ControlId,
        value: ControlValue,
    },
    Menu {
        #[serde(default)]
        client: usize,
        option: MenuOption,
    },
    Ok {
        #[serde(default)]
        client: usize,
    },
    Cancel {
        #[serde(default)]
        client: usize,
    },
    Select {
        #[serde(default)]
        client: usize,
        layout: LayoutId,
    },
    Collapse {
        #[serde(default)]
        client: usize,
    },
    Resize {
        #[serde(default)]
        client: usize,
        width: f64,
        height: f64,
    },
    /// Host-side state change, as on preset load.
    State {
        key: StateKey,
        value: String,
    },
    Dump,
    Quit,
}

struct View {
    renderer: Arc<HeadlessRenderer>,
    actor: SurfaceActor,
}

#[cfg(feature = "midir-output")]
fn midi_sender(args: &Args) -> anyhow::Result<HubMidiSender> {
    use midi_surface::midi::controller::midir::MidirBased;

    Ok(match &args.midi_port {
        Some(port) => Arc::new(MidirBased::new(port)?),
        None => Arc::new(JustPrint),
    })
}

#[cfg(not(feature = "midir-output"))]
fn midi_sender(_args: &Args) -> anyhow::Result<HubMidiSender> {
    Ok(Arc::new(JustPrint))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = match &args.settings {
        Some(path) => configuration::load_from_yaml(path)
            .with_context(|| format!("Loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    let settings = Arc::new(settings);
    let capabilities = Capabilities {
        plugin: args.plugin,
        dev: args.dev,
        mobile: args.mobile,
        pixel_ratio: args.pixel_ratio,
    };

    let network = args.port.map(|port| NetworkDetails {
        addresses: args.addresses.clone(),
        port,
    });
    let hub = HostHub::new(midi_sender(&args)?, network);
    let resolver = Arc::new(DirectoryResolver::new(&args.layouts));
    let runtime = Arc::new(TokioRuntime::current());

    let mut views = Vec::with_capacity(args.clients);
    for _ in 0..args.clients.max(1) {
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
        .await?;
        views.push(View {
            renderer,
            actor: surface.start(),
        });
    }
    tracing::info!("{} view(s) connected", views.len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match serde_json::from_str::<Command>(&line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Unreadable command: {e}");
                continue;
            }
        };
        if let Command::Quit = command {
            break;
        }
        dispatch(&hub, &views, command).await;
    }

    for view in views {
        view.actor.shutdown().await?;
    }
    Ok(())
}

/// Event posted to a view's mailbox for commands aimed at one view.
fn surface_event(command: &Command) -> Option<(usize, SurfaceEvent)> {
    let routed = match command {
        Command::Menu { client, option } => (*client, SurfaceEvent::Menu(*option)),
        Command::Ok { client } => (*client, SurfaceEvent::Dialog(DialogInput::Ok)),
        Command::Cancel { client } => (*client, SurfaceEvent::Dialog(DialogInput::Cancel)),
        Command::Select { client, layout } => (
            *client,
            SurfaceEvent::Dialog(DialogInput::SelectLayout(layout.clone())),
        ),
        Command::Collapse { client } => (*client, SurfaceEvent::ToggleCollapsed),
        Command::Resize { client, .. } => (*client, SurfaceEvent::ViewportResized),
        Command::Input { .. } | Command::State { .. } | Command::Dump | Command::Quit => {
            return None
        }
    };
    Some(routed)
}

async fn dispatch(hub: &HostHub, views: &[View], command: Command) {
    if let Command::Resize {
        client,
        width,
        height,
    } = command
    {
        if let Some(view) = views.get(client) {
            view.renderer.set_window_size(width, height);
        }
    }
    if let Some((client, event)) = surface_event(&command) {
        match views.get(client) {
            Some(view) => {
                if view.actor.mailbox.send(event).await.is_err() {
                    tracing::warn!("View {client} has stopped");
                }
            }
            None => tracing::warn!("No view {client}"),
        }
        return;
    }

    match command {
        Command::Input { client, id, value } => match views.get(client) {
            Some(view) => {
                if !view.renderer.simulate_input(&id, value) {
                    tracing::warn!("View {client} has no control `{id}`");
                }
            }
            None => tracing::warn!("No view {client}"),
        },
        Command::State { key, value } => hub.replace_state(key, value),
        Command::Dump => {
            let dump = serde_json::json!({
                "clients": hub.client_count(),
                "config": hub.state(StateKey::Config),
                "ui": hub.state(StateKey::Ui),
            });
            println!("{dump}");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn cancel_reaches_the_dialog_as_cancel() {
        assert_eq!(
            surface_event(&parse(r#"{"cmd": "cancel", "client": 1}"#)),
            Some((1, SurfaceEvent::Dialog(DialogInput::Cancel)))
        );
    }

    #[test]
    fn view_commands_default_to_the_first_view() {
        assert_eq!(
            surface_event(&parse(r#"{"cmd": "select", "layout": "pads"}"#)),
            Some((
                0,
                SurfaceEvent::Dialog(DialogInput::SelectLayout(LayoutId::from("pads")))
            ))
        );
        assert_eq!(
            surface_event(&parse(r#"{"cmd": "menu", "option": "midi"}"#)),
            Some((0, SurfaceEvent::Menu(MenuOption::Midi)))
        );
        assert_eq!(
            surface_event(&parse(r#"{"cmd": "resize", "width": 400, "height": 300}"#)),
            Some((0, SurfaceEvent::ViewportResized))
        );
    }

    #[test]
    fn hub_commands_are_not_routed_to_a_view() {
        assert_eq!(surface_event(&parse(r#"{"cmd": "dump"}"#)), None);
        assert_eq!(
            surface_event(&parse(r#"{"cmd": "state", "key": "ui", "value": "{}"}"#)),
            None
        );
    }
}
