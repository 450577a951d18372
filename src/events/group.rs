use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::normalize_process_name;

/// Акцентный цвет группы; на классификацию не влияет
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl GroupColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const DODGER_BLUE: GroupColor = GroupColor::rgb(0x1E, 0x90, 0xFF);
    pub const GREEN: GroupColor = GroupColor::rgb(0x00, 0x80, 0x00);
    pub const PURPLE: GroupColor = GroupColor::rgb(0x80, 0x00, 0x80);
    pub const ORANGE: GroupColor = GroupColor::rgb(0xFF, 0xA5, 0x00);
    pub const TEAL: GroupColor = GroupColor::rgb(0x00, 0x80, 0x80);
    pub const BLUE: GroupColor = GroupColor::rgb(0x00, 0x00, 0xFF);
}

impl Default for GroupColor {
    fn default() -> Self {
        GroupColor::BLUE
    }
}

impl fmt::Display for GroupColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for GroupColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("Неверный цвет '{}', ожидается #RRGGBB", s));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
        Ok(GroupColor::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for GroupColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupColor> for String {
    fn from(color: GroupColor) -> Self {
        color.to_string()
    }
}

/// Пользовательская группа приложений.
///
/// Принадлежность определяется только именем процесса (без пути и заголовка),
/// имена хранятся нормализованными к нижнему регистру.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(deserialize_with = "deserialize_process_names")]
    process_names: Vec<String>,
    #[serde(default)]
    pub color: GroupColor,
}

impl Group {
    pub fn new<I, S>(name: impl Into<String>, process_names: I, color: GroupColor) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut group = Self {
            name: name.into(),
            process_names: Vec::new(),
            color,
        };
        for process in process_names {
            group.add_process(process.as_ref());
        }
        group
    }

    pub fn process_names(&self) -> &[String] {
        &self.process_names
    }

    /// Добавить процесс; дубликаты и пустые имена игнорируются
    pub fn add_process(&mut self, process_name: &str) {
        let normalized = normalize_process_name(process_name);
        if !normalized.is_empty() && !self.process_names.contains(&normalized) {
            self.process_names.push(normalized);
        }
    }

    /// Регистронезависимое точное сравнение с именем процесса
    pub fn contains_process(&self, process_name: &str) -> bool {
        let normalized = normalize_process_name(process_name);
        self.process_names.iter().any(|p| *p == normalized)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]", self.name, self.color, self.process_names.join(", "))
    }
}

fn deserialize_process_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw {
        let normalized = normalize_process_name(&name);
        if !normalized.is_empty() && !names.contains(&normalized) {
            names.push(normalized);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_normalizes_process_names() {
        let group = Group::new(
            "Development",
            ["Code", "devenv.exe", "code", "  "],
            GroupColor::GREEN,
        );
        assert_eq!(group.process_names(), &["code".to_string(), "devenv".to_string()]);
        assert!(group.contains_process("CODE"));
        assert!(group.contains_process("DevEnv.EXE"));
        assert!(!group.contains_process("code-insiders"));
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!("#1E90FF".parse::<GroupColor>().unwrap(), GroupColor::DODGER_BLUE);
        assert_eq!("1e90ff".parse::<GroupColor>().unwrap(), GroupColor::DODGER_BLUE);
        assert!("#12345".parse::<GroupColor>().is_err());
        assert!("#GGGGGG".parse::<GroupColor>().is_err());
        assert_eq!(GroupColor::ORANGE.to_string(), "#FFA500");
    }
}
