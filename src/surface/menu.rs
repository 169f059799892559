use serde::Deserialize;

use crate::configuration::Capabilities;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuOption {
    About,
    Layout,
    Midi,
    Network,
}

impl MenuOption {
    pub const ALL: [MenuOption; 4] = [
        MenuOption::About,
        MenuOption::Layout,
        MenuOption::Midi,
        MenuOption::Network,
    ];

    /// MIDI and network settings only exist inside a plugin.
    pub fn is_available(&self, capabilities: &Capabilities) -> bool {
        match self {
            MenuOption::About | MenuOption::Layout => true,
            MenuOption::Midi | MenuOption::Network => capabilities.plugin,
        }
    }

    pub fn available(capabilities: &Capabilities) -> Vec<MenuOption> {
        MenuOption::ALL
            .into_iter()
            .filter(|option| option.is_available(capabilities))
            .collect()
    }
}
