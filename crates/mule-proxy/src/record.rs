//! Account record model and its two wire formats.
//!
//! The upstream answers `/char/list` with an XML `<Chars>` document. Live
//! responses are re-shaped into a JSON envelope; cache fallbacks are replayed
//! as XML. Every value is kept as the upstream's own text: numbers may come
//! back in forms such as `1.2e3` and must reach the client untouched.
//!
//! Attributes deserialize from `@name` (quick-xml's attribute convention) and
//! serialize to JSON under the names clients already read (`NextCharID`,
//! `MaxNumChars`, `ID`, `ObjectType`).

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize, Serializer};

/// The `<Chars>` document: every character of one account plus account-wide
/// data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountRecord {
    /// Empty when the upstream had nothing usable to say, e.g. after a
    /// credential rejection.
    #[serde(rename(serialize = "NextCharID", deserialize = "@nextCharId"))]
    pub next_char_id: String,
    #[serde(rename(serialize = "MaxNumChars", deserialize = "@maxNumChars"))]
    pub max_num_chars: String,
    #[serde(rename = "Char")]
    pub chars: Vec<Character>,
    #[serde(rename = "Account")]
    pub account: Account,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Character {
    #[serde(rename(serialize = "ID", deserialize = "@id"))]
    pub id: String,
    pub object_type: String,
    pub level: String,
    pub exp: String,
    pub current_fame: String,
    pub equipment: String,
    pub max_hit_points: String,
    pub hit_points: String,
    pub max_magic_points: String,
    pub magic_points: String,
    pub attack: String,
    pub defense: String,
    pub speed: String,
    pub dexterity: String,
    pub hp_regen: String,
    pub mp_regen: String,
    pub health_stack_count: String,
    pub magic_stack_count: String,
    pub dead: String,
    #[serde(rename = "PCStats")]
    pub pc_stats: String,
    pub account: CharacterOwner,
    pub has_backpack: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CharacterOwner {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Account {
    pub name: String,
    pub gifts: String,
    pub vault: Vault,
    pub stats: AccountStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Vault {
    pub chest: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AccountStats {
    /// Every `ClassStats` element; JSON only carries the last one.
    #[serde(serialize_with = "serialize_last_class_stats")]
    pub class_stats: Vec<ClassStats>,
    pub best_char_fame: String,
    pub total_fame: String,
    pub fame: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ClassStats {
    #[serde(rename(serialize = "ObjectType", deserialize = "@objectType"))]
    pub object_type: String,
    pub best_level: String,
    pub best_fame: String,
}

fn serialize_last_class_stats<S: Serializer>(stats: &[ClassStats], s: S) -> Result<S::Ok, S::Error> {
    match stats.last() {
        Some(last) => last.serialize(s),
        None => ClassStats::default().serialize(s),
    }
}

/// Errors raised while reading or writing the upstream document.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed account document: {0}")]
    Decode(#[from] quick_xml::DeError),

    #[error("failed to encode account document: {0}")]
    Encode(String),
}

impl AccountRecord {
    /// Parse an upstream `<Chars>` document.
    pub fn from_xml(xml: &str) -> Result<Self, RecordError> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Whether the upstream actually returned account data.
    pub fn is_usable(&self) -> bool {
        !self.next_char_id.is_empty()
    }

    /// Render the record back into the upstream's document format.
    pub fn to_xml(&self) -> Result<Vec<u8>, RecordError> {
        let mut writer = Writer::new(Vec::new());
        self.write_xml(&mut writer)?;
        Ok(writer.into_inner())
    }

    fn write_xml<W: Write>(&self, w: &mut Writer<W>) -> Result<(), RecordError> {
        let mut root = BytesStart::new("Chars");
        root.push_attribute(("nextCharId", self.next_char_id.as_str()));
        root.push_attribute(("maxNumChars", self.max_num_chars.as_str()));
        emit(w, Event::Start(root))?;

        for character in &self.chars {
            character.write_xml(w)?;
        }
        self.account.write_xml(w)?;

        emit(w, Event::End(BytesEnd::new("Chars")))
    }
}

impl Character {
    fn write_xml<W: Write>(&self, w: &mut Writer<W>) -> Result<(), RecordError> {
        let mut start = BytesStart::new("Char");
        start.push_attribute(("id", self.id.as_str()));
        emit(w, Event::Start(start))?;

        for (name, value) in [
            ("ObjectType", &self.object_type),
            ("Level", &self.level),
            ("Exp", &self.exp),
            ("CurrentFame", &self.current_fame),
            ("Equipment", &self.equipment),
            ("MaxHitPoints", &self.max_hit_points),
            ("HitPoints", &self.hit_points),
            ("MaxMagicPoints", &self.max_magic_points),
            ("MagicPoints", &self.magic_points),
            ("Attack", &self.attack),
            ("Defense", &self.defense),
            ("Speed", &self.speed),
            ("Dexterity", &self.dexterity),
            ("HpRegen", &self.hp_regen),
            ("MpRegen", &self.mp_regen),
            ("HealthStackCount", &self.health_stack_count),
            ("MagicStackCount", &self.magic_stack_count),
            ("Dead", &self.dead),
            ("PCStats", &self.pc_stats),
        ] {
            text_element(w, name, value)?;
        }

        emit(w, Event::Start(BytesStart::new("Account")))?;
        text_element(w, "Name", &self.account.name)?;
        emit(w, Event::End(BytesEnd::new("Account")))?;

        text_element(w, "HasBackpack", &self.has_backpack)?;
        emit(w, Event::End(BytesEnd::new("Char")))
    }
}

impl Account {
    fn write_xml<W: Write>(&self, w: &mut Writer<W>) -> Result<(), RecordError> {
        emit(w, Event::Start(BytesStart::new("Account")))?;

        emit(w, Event::Start(BytesStart::new("Vault")))?;
        for chest in &self.vault.chest {
            text_element(w, "Chest", chest)?;
        }
        emit(w, Event::End(BytesEnd::new("Vault")))?;

        text_element(w, "Gifts", &self.gifts)?;
        text_element(w, "Name", &self.name)?;

        emit(w, Event::Start(BytesStart::new("Stats")))?;
        for class in &self.stats.class_stats {
            let mut start = BytesStart::new("ClassStats");
            start.push_attribute(("objectType", class.object_type.as_str()));
            emit(w, Event::Start(start))?;
            text_element(w, "BestLevel", &class.best_level)?;
            text_element(w, "BestFame", &class.best_fame)?;
            emit(w, Event::End(BytesEnd::new("ClassStats")))?;
        }
        text_element(w, "BestCharFame", &self.stats.best_char_fame)?;
        text_element(w, "TotalFame", &self.stats.total_fame)?;
        text_element(w, "Fame", &self.stats.fame)?;
        emit(w, Event::End(BytesEnd::new("Stats")))?;

        emit(w, Event::End(BytesEnd::new("Account")))
    }
}

fn emit<W: Write>(w: &mut Writer<W>, event: Event<'_>) -> Result<(), RecordError> {
    w.write_event(event)
        .map_err(|e| RecordError::Encode(e.to_string()))
}

fn text_element<W: Write>(w: &mut Writer<W>, name: &str, value: &str) -> Result<(), RecordError> {
    emit(w, Event::Start(BytesStart::new(name)))?;
    if !value.is_empty() {
        emit(w, Event::Text(BytesText::new(value)))?;
    }
    emit(w, Event::End(BytesEnd::new(name)))
}

/// Outward JSON shape for live responses:
/// `{"query": {"results": {"Chars": <record>}}}`.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    query: Query<'a>,
}

#[derive(Debug, Serialize)]
struct Query<'a> {
    results: Results<'a>,
}

#[derive(Debug, Serialize)]
struct Results<'a> {
    #[serde(rename = "Chars")]
    chars: &'a AccountRecord,
}

impl<'a> Envelope<'a> {
    pub fn new(record: &'a AccountRecord) -> Self {
        Self {
            query: Query {
                results: Results { chars: record },
            },
        }
    }
}
