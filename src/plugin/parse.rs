use std::collections::BTreeSet;

use crate::GameId;

use super::error::PluginParseError;

/// A record ID resolved against the owning plugin's master list. Two plugins
/// contain the same record when their resolved IDs are equal.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct ResolvedId {
    /// The lowercased filename of the plugin that the record belongs to.
    pub(crate) source: Box<str>,
    pub(crate) object: u32,
}

/// The facts read from a plugin file.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ParsedPlugin {
    pub(crate) is_master: bool,
    pub(crate) is_light: bool,
    /// Whether the light flag bit is set, even for games that don't support
    /// light plugins.
    pub(crate) has_light_flag: bool,
    pub(crate) is_medium: bool,
    pub(crate) is_update: bool,
    pub(crate) is_blueprint: bool,
    pub(crate) header_version: Option<f32>,
    pub(crate) masters: Vec<String>,
    pub(crate) description: Option<String>,
    /// The number of records other than the header record, including records
    /// that override masters' records.
    pub(crate) record_count: usize,
    pub(crate) form_ids: BTreeSet<ResolvedId>,
    /// Object IDs (24-bit, unmasked by plugin type) of records that the
    /// plugin introduces rather than overrides.
    pub(crate) new_object_ids: Vec<u32>,
    pub(crate) override_record_count: usize,
    /// True if the file ended mid-record and the other fields are incomplete.
    pub(crate) is_partial: bool,
}

const MASTER_FLAG: u32 = 0x1;
const BLUEPRINT_FLAG: u32 = 0x80;
const LIGHT_FLAG: u32 = 0x200;
const MEDIUM_FLAG: u32 = 0x400;
const UPDATE_FLAG: u32 = 0x800;

const FULL_OBJECT_MASK: u32 = 0x00FF_FFFF;
const MEDIUM_OBJECT_MASK: u32 = 0xFFFF;
const LIGHT_OBJECT_MASK: u32 = 0xFFF;

pub(crate) const LIGHT_OBJECT_RANGE: std::ops::RangeInclusive<u32> = 0x800..=0xFFF;

fn to_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes
        .get(at..at.checked_add(2)?)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
}

fn to_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at.checked_add(4)?)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
}

fn to_f32(bytes: &[u8], at: usize) -> Option<f32> {
    to_u32(bytes, at).map(f32::from_bits)
}

fn to_usize(value: u32) -> usize {
    // The conversion is lossless on all relevant target platforms.
    const _: () = assert!(u32::BITS <= usize::BITS, "cannot fit a u32 into a usize!");
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// The size of a non-header record's on-disk header.
fn record_header_size(game_id: GameId) -> usize {
    match game_id {
        GameId::Morrowind | GameId::OpenMW => 16,
        GameId::Oblivion | GameId::Nehrim => 20,
        _ => 24,
    }
}

fn group_header_size(game_id: GameId) -> usize {
    match game_id {
        GameId::Oblivion | GameId::Nehrim => 20,
        _ => 24,
    }
}

/// Decode a Windows-1252 byte string. All byte values are mapped, so this
/// cannot fail.
pub(crate) fn decode_windows_1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&byte| match byte {
            0x80 => '\u{20AC}',
            0x82 => '\u{201A}',
            0x83 => '\u{0192}',
            0x84 => '\u{201E}',
            0x85 => '\u{2026}',
            0x86 => '\u{2020}',
            0x87 => '\u{2021}',
            0x88 => '\u{02C6}',
            0x89 => '\u{2030}',
            0x8A => '\u{0160}',
            0x8B => '\u{2039}',
            0x8C => '\u{0152}',
            0x8E => '\u{017D}',
            0x91 => '\u{2018}',
            0x92 => '\u{2019}',
            0x93 => '\u{201C}',
            0x94 => '\u{201D}',
            0x95 => '\u{2022}',
            0x96 => '\u{2013}',
            0x97 => '\u{2014}',
            0x98 => '\u{02DC}',
            0x99 => '\u{2122}',
            0x9A => '\u{0161}',
            0x9B => '\u{203A}',
            0x9C => '\u{0153}',
            0x9E => '\u{017E}',
            _ => char::from(byte),
        })
        .collect()
}

fn decode_zstring(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    decode_windows_1252(bytes.get(..end).unwrap_or(bytes))
}

struct Subrecord<'a> {
    signature: [u8; 4],
    data: &'a [u8],
}

struct SubrecordIter<'a> {
    data: &'a [u8],
    offset: usize,
    truncated: bool,
}

impl<'a> SubrecordIter<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            truncated: false,
        }
    }
}

impl<'a> Iterator for SubrecordIter<'a> {
    type Item = Subrecord<'a>;

    fn next(&mut self) -> Option<Subrecord<'a>> {
        if self.offset >= self.data.len() {
            return None;
        }

        let signature: [u8; 4] = self
            .data
            .get(self.offset..self.offset + 4)
            .and_then(|b| b.try_into().ok())?;
        let size = to_usize(u32::from(to_u16(self.data, self.offset + 4)?));

        let start = self.offset + 6;
        let Some(data) = self.data.get(start..start + size) else {
            self.truncated = true;
            return None;
        };

        self.offset = start + size;

        Some(Subrecord { signature, data })
    }
}

/// Parse a plugin file's bytes. `filename` is used to resolve record IDs
/// that the plugin itself introduces.
pub(crate) fn parse_plugin(
    input: &[u8],
    game_id: GameId,
    filename: &str,
    header_only: bool,
) -> Result<ParsedPlugin, PluginParseError> {
    if input.get(..4) != Some(game_id.header_magic().as_slice()) {
        return Err(PluginParseError::NotAPlugin);
    }

    let mut plugin = ParsedPlugin::default();

    let Some(header_data_size) = to_u32(input, 4).map(to_usize) else {
        return truncated(plugin);
    };
    let Some(header_flags) = to_u32(input, 8) else {
        return truncated(plugin);
    };

    read_header_flags(&mut plugin, game_id, header_flags);

    let header_size = record_header_size(game_id);
    let Some(header_data) = input.get(header_size..header_size + header_data_size) else {
        // Read what subrecords are present before reporting the truncation.
        if let Some(partial_data) = input.get(header_size..) {
            read_header_subrecords(&mut plugin, game_id, partial_data);
        }
        return truncated(plugin);
    };

    if !read_header_subrecords(&mut plugin, game_id, header_data) {
        return truncated(plugin);
    }

    if header_only {
        return Ok(plugin);
    }

    let Some(body) = input.get(header_size + header_data_size..) else {
        return truncated(plugin);
    };

    let raw_form_ids = if game_id.header_magic() == b"TES3" {
        read_tes3_records(&mut plugin, body)?
    } else {
        read_tes4_records(&mut plugin, game_id, body)?
    };

    resolve_form_ids(&mut plugin, filename, &raw_form_ids);

    Ok(plugin)
}

fn truncated(mut plugin: ParsedPlugin) -> Result<ParsedPlugin, PluginParseError> {
    plugin.is_partial = true;
    Err(PluginParseError::Truncated(Box::new(plugin)))
}

fn read_header_flags(plugin: &mut ParsedPlugin, game_id: GameId, flags: u32) {
    if game_id.header_magic() == b"TES3" {
        // Morrowind has no flag bits in common with the later games; whether
        // a plugin is a master is decided by its file extension.
        return;
    }

    plugin.is_master = flags & MASTER_FLAG != 0;
    plugin.has_light_flag = flags & LIGHT_FLAG != 0;
    plugin.is_light = game_id.supports_light_plugins() && plugin.has_light_flag;
    plugin.is_medium = game_id.supports_medium_plugins() && flags & MEDIUM_FLAG != 0;
    plugin.is_update = game_id.supports_update_plugins() && flags & UPDATE_FLAG != 0;
    plugin.is_blueprint = game_id.supports_blueprint_plugins() && flags & BLUEPRINT_FLAG != 0;

    // A plugin cannot be both medium and light; the medium flag wins, as it
    // does in the game.
    if plugin.is_medium {
        plugin.is_light = false;
    }
}

/// Returns false if the subrecord data ended mid-subrecord.
fn read_header_subrecords(plugin: &mut ParsedPlugin, game_id: GameId, data: &[u8]) -> bool {
    let is_tes3 = game_id.header_magic() == b"TES3";

    let mut iter = SubrecordIter::new(data);
    for subrecord in &mut iter {
        match &subrecord.signature {
            b"HEDR" => {
                plugin.header_version = to_f32(subrecord.data, 0);

                if is_tes3 {
                    // TES3's HEDR holds the author and description inline.
                    if let Some(description) = subrecord.data.get(40..296) {
                        plugin.description = Some(decode_zstring(description));
                    }
                }
            }
            b"MAST" => {
                plugin.masters.push(decode_zstring(subrecord.data));
            }
            b"SNAM" if !is_tes3 => {
                plugin.description = Some(decode_zstring(subrecord.data));
            }
            // The author string must be read past, but isn't used.
            b"CNAM" | b"DATA" | b"ONAM" | b"INTV" | b"INCC" => {}
            _ => {}
        }
    }

    !iter.truncated
}

fn read_tes4_records(
    plugin: &mut ParsedPlugin,
    game_id: GameId,
    body: &[u8],
) -> Result<Vec<u32>, PluginParseError> {
    let mut form_ids = Vec::new();
    let mut offset = 0;

    while offset < body.len() {
        if body.get(offset..offset + 4) == Some(b"GRUP") {
            let Some(group_size) = to_u32(body, offset + 4).map(to_usize) else {
                return truncated_with_form_ids(plugin, form_ids);
            };

            let header_size = group_header_size(game_id);
            if group_size < header_size || offset + group_size > body.len() {
                return truncated_with_form_ids(plugin, form_ids);
            }

            let Some(entries) = body.get(offset + header_size..offset + group_size) else {
                return truncated_with_form_ids(plugin, form_ids);
            };

            let mut group_form_ids = read_tes4_group_entries(plugin, game_id, entries)?;
            form_ids.append(&mut group_form_ids);

            offset += group_size;
        } else {
            match read_tes4_record(plugin, game_id, body, offset) {
                Some((form_id, next_offset)) => {
                    form_ids.push(form_id);
                    offset = next_offset;
                }
                None => return truncated_with_form_ids(plugin, form_ids),
            }
        }
    }

    Ok(form_ids)
}

fn read_tes4_group_entries(
    plugin: &mut ParsedPlugin,
    game_id: GameId,
    entries: &[u8],
) -> Result<Vec<u32>, PluginParseError> {
    // Nested groups have the same layout as top-level ones, so the walk is
    // the same.
    read_tes4_records(plugin, game_id, entries)
}

fn read_tes4_record(
    plugin: &mut ParsedPlugin,
    game_id: GameId,
    body: &[u8],
    offset: usize,
) -> Option<(u32, usize)> {
    body.get(offset..offset + 4)?;

    let data_size = to_usize(to_u32(body, offset + 4)?);
    let form_id = to_u32(body, offset + 12)?;

    let next_offset = offset + record_header_size(game_id) + data_size;
    if next_offset > body.len() {
        return None;
    }

    plugin.record_count += 1;

    Some((form_id, next_offset))
}

fn read_tes3_records(
    plugin: &mut ParsedPlugin,
    body: &[u8],
) -> Result<Vec<u32>, PluginParseError> {
    let mut offset = 0;

    while offset < body.len() {
        let Some(signature) = body.get(offset..offset + 4) else {
            return truncated_with_form_ids(plugin, Vec::new());
        };
        let Some(data_size) = to_u32(body, offset + 4).map(to_usize) else {
            return truncated_with_form_ids(plugin, Vec::new());
        };

        let data_start = offset + 16;
        let Some(data) = body.get(data_start..data_start + data_size) else {
            return truncated_with_form_ids(plugin, Vec::new());
        };

        plugin.record_count += 1;

        // TES3 records have no FormIDs; a record is identified by its type
        // and its NAME subrecord, hashed into the 32-bit ID space.
        let name = SubrecordIter::new(data)
            .find(|s| &s.signature == b"NAME")
            .map(|s| s.data.to_vec())
            .unwrap_or_default();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(signature);
        hasher.update(&name);

        plugin.form_ids.insert(ResolvedId {
            source: Box::default(),
            object: hasher.finalize(),
        });

        offset = data_start + data_size;
    }

    Ok(Vec::new())
}

fn truncated_with_form_ids(
    plugin: &mut ParsedPlugin,
    form_ids: Vec<u32>,
) -> Result<Vec<u32>, PluginParseError> {
    let mut partial = plugin.clone();
    resolve_form_ids(&mut partial, "", &form_ids);
    partial.is_partial = true;
    Err(PluginParseError::Truncated(Box::new(partial)))
}

fn resolve_form_ids(plugin: &mut ParsedPlugin, filename: &str, raw_form_ids: &[u32]) {
    let own_mask = if plugin.is_light {
        LIGHT_OBJECT_MASK
    } else if plugin.is_medium {
        MEDIUM_OBJECT_MASK
    } else {
        FULL_OBJECT_MASK
    };

    let own_name: Box<str> = filename.to_lowercase().into();

    for &raw in raw_form_ids {
        let master_index = to_usize(raw >> 24);

        if let Some(master) = plugin.masters.get(master_index) {
            plugin.override_record_count += 1;
            plugin.form_ids.insert(ResolvedId {
                source: master.to_lowercase().into(),
                object: raw & FULL_OBJECT_MASK,
            });
        } else {
            plugin.new_object_ids.push(raw & FULL_OBJECT_MASK);
            plugin.form_ids.insert(ResolvedId {
                source: own_name.clone(),
                object: raw & own_mask,
            });
        }
    }
}

impl ParsedPlugin {
    pub(crate) fn is_valid_as_light_plugin(&self) -> bool {
        self.new_object_ids
            .iter()
            .all(|id| LIGHT_OBJECT_RANGE.contains(id))
    }

    pub(crate) fn is_valid_as_medium_plugin(&self) -> bool {
        self.new_object_ids
            .iter()
            .all(|id| *id <= MEDIUM_OBJECT_MASK)
    }

    /// An update plugin may only override its masters' records.
    pub(crate) fn is_valid_as_update_plugin(&self) -> bool {
        self.new_object_ids.is_empty()
    }
}
