mod session;

pub use session::GameSession;

use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Codes used to identify the games that loadsmith supports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[non_exhaustive]
pub enum GameId {
    /// The Elder Scrolls III: Morrowind
    Morrowind,
    /// OpenMW
    OpenMW,
    /// The Elder Scrolls IV: Oblivion
    Oblivion,
    /// Nehrim - At Fate's Edge
    Nehrim,
    /// The Elder Scrolls V: Skyrim
    Skyrim,
    /// The Elder Scrolls V: Skyrim Special Edition
    SkyrimSE,
    /// The Elder Scrolls V: Skyrim VR
    SkyrimVR,
    /// Enderal: Forgotten Stories
    Enderal,
    /// Enderal: Forgotten Stories (Special Edition)
    EnderalSE,
    /// Fallout 3
    Fallout3,
    /// Fallout: New Vegas
    FalloutNV,
    /// Fallout 4
    Fallout4,
    /// Fallout 4 VR
    Fallout4VR,
    /// Starfield
    Starfield,
}

impl Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameId::Morrowind => write!(f, "The Elder Scrolls III: Morrowind"),
            GameId::OpenMW => write!(f, "OpenMW"),
            GameId::Oblivion => write!(f, "The Elder Scrolls IV: Oblivion"),
            GameId::Nehrim => write!(f, "Nehrim - At Fate's Edge"),
            GameId::Skyrim => write!(f, "The Elder Scrolls V: Skyrim"),
            GameId::SkyrimSE => write!(f, "The Elder Scrolls V: Skyrim Special Edition"),
            GameId::SkyrimVR => write!(f, "The Elder Scrolls V: Skyrim VR"),
            GameId::Enderal => write!(f, "Enderal: Forgotten Stories"),
            GameId::EnderalSE => write!(f, "Enderal: Forgotten Stories (Special Edition)"),
            GameId::Fallout3 => write!(f, "Fallout 3"),
            GameId::FalloutNV => write!(f, "Fallout: New Vegas"),
            GameId::Fallout4 => write!(f, "Fallout 4"),
            GameId::Fallout4VR => write!(f, "Fallout 4 VR"),
            GameId::Starfield => write!(f, "Starfield"),
        }
    }
}

/// The way in which a game stores its load order on disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[non_exhaustive]
pub enum LoadOrderMethod {
    /// Load order is the ascending order of plugin file timestamps, with an
    /// active plugins list file.
    Timestamp,
    /// Load order is stored in loadorder.txt, the active plugins in
    /// plugins.txt.
    Textfile,
    /// A single plugins.txt stores the load order, with active plugins marked
    /// by an asterisk prefix.
    Asterisk,
    /// Load order is the order of content lines in openmw.cfg, all of which
    /// are active.
    OpenMW,
}

impl GameId {
    /// Get the filename of the game's main master plugin.
    pub fn master_file(self) -> &'static str {
        match self {
            GameId::Morrowind | GameId::OpenMW => "Morrowind.esm",
            GameId::Oblivion => "Oblivion.esm",
            GameId::Nehrim => "Nehrim.esm",
            GameId::Skyrim | GameId::SkyrimSE | GameId::SkyrimVR => "Skyrim.esm",
            GameId::Enderal | GameId::EnderalSE => "Skyrim.esm",
            GameId::Fallout3 => "Fallout3.esm",
            GameId::FalloutNV => "FalloutNV.esm",
            GameId::Fallout4 | GameId::Fallout4VR => "Fallout4.esm",
            GameId::Starfield => "Starfield.esm",
        }
    }

    /// Get the magic bytes that start the game's plugin header records.
    pub(crate) fn header_magic(self) -> &'static [u8; 4] {
        match self {
            GameId::Morrowind | GameId::OpenMW => b"TES3",
            _ => b"TES4",
        }
    }

    pub(crate) fn supports_light_plugins(self) -> bool {
        matches!(
            self,
            GameId::SkyrimSE
                | GameId::SkyrimVR
                | GameId::EnderalSE
                | GameId::Fallout4
                | GameId::Fallout4VR
                | GameId::Starfield
        )
    }

    pub(crate) fn supports_medium_plugins(self) -> bool {
        self == GameId::Starfield
    }

    pub(crate) fn supports_update_plugins(self) -> bool {
        self == GameId::Starfield
    }

    pub(crate) fn supports_blueprint_plugins(self) -> bool {
        self == GameId::Starfield
    }

    /// Whether plugin files may use the .esl file extension.
    pub(crate) fn supports_esl_extension(self) -> bool {
        self.supports_light_plugins()
    }

    /// The maximum number of active full plugins that the game can load.
    pub(crate) fn max_active_full_plugins(self) -> usize {
        match self {
            GameId::Starfield => 253,
            _ if self.supports_light_plugins() => 254,
            _ => 255,
        }
    }

    pub(crate) fn max_active_light_plugins(self) -> usize {
        if self.supports_light_plugins() { 4096 } else { 0 }
    }

    pub(crate) fn max_active_medium_plugins(self) -> usize {
        if self.supports_medium_plugins() { 256 } else { 0 }
    }

    /// The oldest plugin header version that the game's current version
    /// creates. Plugins with older headers were made for older game versions
    /// and may not load correctly.
    pub(crate) fn minimum_header_version(self) -> f32 {
        match self {
            GameId::Morrowind | GameId::OpenMW => 1.2,
            GameId::Oblivion | GameId::Nehrim => 0.8,
            GameId::Skyrim | GameId::Enderal | GameId::Fallout3 => 0.94,
            GameId::FalloutNV => 1.32,
            GameId::SkyrimSE | GameId::SkyrimVR | GameId::EnderalSE => 1.7,
            GameId::Fallout4 | GameId::Fallout4VR => 0.95,
            GameId::Starfield => 0.96,
        }
    }

    pub(crate) fn load_order_method(self) -> LoadOrderMethod {
        match self {
            GameId::Morrowind
            | GameId::Oblivion
            | GameId::Nehrim
            | GameId::Fallout3
            | GameId::FalloutNV => LoadOrderMethod::Timestamp,
            GameId::Skyrim | GameId::Enderal => LoadOrderMethod::Textfile,
            GameId::SkyrimSE
            | GameId::SkyrimVR
            | GameId::EnderalSE
            | GameId::Fallout4
            | GameId::Fallout4VR
            | GameId::Starfield => LoadOrderMethod::Asterisk,
            GameId::OpenMW => LoadOrderMethod::OpenMW,
        }
    }

    /// Plugins that the game loads without them being listed as active, in
    /// their hardcoded load order.
    pub(crate) fn implicitly_active_plugins(self) -> &'static [&'static str] {
        match self {
            GameId::Skyrim | GameId::Enderal => &["Skyrim.esm", "Update.esm"],
            GameId::SkyrimSE | GameId::EnderalSE => &[
                "Skyrim.esm",
                "Update.esm",
                "Dawnguard.esm",
                "HearthFires.esm",
                "Dragonborn.esm",
            ],
            GameId::SkyrimVR => &[
                "Skyrim.esm",
                "Update.esm",
                "Dawnguard.esm",
                "HearthFires.esm",
                "Dragonborn.esm",
                "SkyrimVR.esm",
            ],
            GameId::Fallout4 => &[
                "Fallout4.esm",
                "DLCRobot.esm",
                "DLCworkshop01.esm",
                "DLCCoast.esm",
                "DLCworkshop02.esm",
                "DLCworkshop03.esm",
                "DLCNukaWorld.esm",
                "DLCUltraHighResolution.esm",
            ],
            GameId::Fallout4VR => &["Fallout4.esm", "Fallout4_VR.esm"],
            GameId::Starfield => &[
                "Starfield.esm",
                "Constellation.esm",
                "OldMars.esm",
                "SFBGS003.esm",
                "SFBGS004.esm",
                "SFBGS006.esm",
                "SFBGS007.esm",
                "SFBGS008.esm",
                "BlueprintShips-Starfield.esm",
            ],
            _ => &[],
        }
    }

    /// Whether the game refuses to load a plugin with a missing master even
    /// when the plugin is inactive.
    pub(crate) fn requires_all_masters_present(self) -> bool {
        matches!(self, GameId::Morrowind | GameId::OpenMW | GameId::Starfield)
    }

    pub(crate) fn data_path(self, game_path: &Path) -> PathBuf {
        match self {
            GameId::Morrowind => game_path.join("Data Files"),
            GameId::OpenMW => game_path.join("resources/vfs"),
            _ => game_path.join("Data"),
        }
    }

    pub(crate) fn archive_file_extension(self) -> &'static str {
        match self {
            GameId::Fallout4 | GameId::Fallout4VR | GameId::Starfield => ".ba2",
            _ => ".bsa",
        }
    }
}

#[cfg(test)]
pub(crate) const ALL_GAME_IDS: [GameId; 14] = [
    GameId::Morrowind,
    GameId::OpenMW,
    GameId::Oblivion,
    GameId::Nehrim,
    GameId::Skyrim,
    GameId::SkyrimSE,
    GameId::SkyrimVR,
    GameId::Enderal,
    GameId::EnderalSE,
    GameId::Fallout3,
    GameId::FalloutNV,
    GameId::Fallout4,
    GameId::Fallout4VR,
    GameId::Starfield,
];
