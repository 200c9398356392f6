use crate::error::{FocusLockError, Result};
use crate::mappings::KeyNames;
use std::fmt;
use std::ops::BitOr;

/// Направление перехода клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDirection {
    Down,
    Up,
}

/// Клавиша (обобщённый виртуальный код Windows)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(u16);

impl Key {
    pub const SHIFT: Key = Key(0x10);
    pub const CONTROL: Key = Key(0x11);
    pub const ALT: Key = Key(0x12);
    pub const WIN: Key = Key(0x5B);

    /// Преобразовать VK код из системного события в `Key`.
    ///
    /// Левые/правые варианты модификаторов сводятся к одной клавише,
    /// чтобы аккорд "ctrl" срабатывал от любого Ctrl.
    pub fn from_virtual_key(vk: u16) -> Self {
        match vk {
            0xA0 | 0xA1 => Self::SHIFT,   // VK_LSHIFT | VK_RSHIFT
            0xA2 | 0xA3 => Self::CONTROL, // VK_LCONTROL | VK_RCONTROL
            0xA4 | 0xA5 => Self::ALT,     // VK_LMENU | VK_RMENU
            0x5C => Self::WIN,            // VK_RWIN
            other => Self(other),
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        KeyNames::vk_code(name)
            .map(Self::from_virtual_key)
            .ok_or_else(|| FocusLockError::InvalidConfiguration(format!("неизвестная клавиша '{}'", name)))
    }

    #[allow(dead_code)]
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Модификатор, который соответствует этой клавише (если она модификатор)
    pub fn as_modifier(&self) -> Option<ModifierSet> {
        match *self {
            Self::SHIFT => Some(ModifierSet::SHIFT),
            Self::CONTROL => Some(ModifierSet::CONTROL),
            Self::ALT => Some(ModifierSet::ALT),
            Self::WIN => Some(ModifierSet::SUPER),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match KeyNames::name(self.0) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "VK_0x{:02X}", self.0),
        }
    }
}

/// Набор модификаторов в виде битовых флагов.
///
/// Используется и как требуемая конфигурация аккорда, и как наблюдаемое
/// "живое" состояние клавиатуры.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierSet(u8);

impl ModifierSet {
    pub const SHIFT: ModifierSet = ModifierSet(0b0001);
    pub const CONTROL: ModifierSet = ModifierSet(0b0010);
    pub const ALT: ModifierSet = ModifierSet(0b0100);
    pub const SUPER: ModifierSet = ModifierSet(0b1000);

    const ALL: [(ModifierSet, &'static str); 4] = [
        (Self::CONTROL, "ctrl"),
        (Self::ALT, "alt"),
        (Self::SHIFT, "shift"),
        (Self::SUPER, "win"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: ModifierSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ModifierSet) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ModifierSet) {
        self.0 &= !other.0;
    }

    pub fn with(mut self, other: ModifierSet) -> Self {
        self.insert(other);
        self
    }

    /// Точное совпадение по каждому из флагов Shift/Control/Alt/OS.
    ///
    /// Лишний нажатый модификатор делает совпадение ложным.
    pub fn matches_exactly(&self, observed: ModifierSet) -> bool {
        Self::ALL
            .iter()
            .all(|(flag, _)| self.contains(*flag) == observed.contains(*flag))
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut result = Self::empty();
        for name in names {
            let flag = match name.as_ref().trim().to_lowercase().as_str() {
                "ctrl" | "control" => Self::CONTROL,
                "alt" => Self::ALT,
                "shift" => Self::SHIFT,
                "win" | "super" | "meta" => Self::SUPER,
                other => {
                    return FocusLockError::invalid_configuration(format!(
                        "неизвестный модификатор '{}'",
                        other
                    ))
                }
            };
            result.insert(flag);
        }
        Ok(result)
    }

    pub fn to_vec(&self) -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for ModifierSet {
    type Output = ModifierSet;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.with(rhs)
    }
}

impl fmt::Display for ModifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.to_vec().join("+"))
        }
    }
}

/// Переход клавиши, доставленный системным перехватчиком
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: Key,
    pub direction: KeyDirection,
}

impl KeyTransition {
    pub fn new(key: Key, direction: KeyDirection) -> Self {
        Self { key, direction }
    }

    #[allow(dead_code)]
    pub fn down(key: Key) -> Self {
        Self::new(key, KeyDirection::Down)
    }

    #[allow(dead_code)]
    pub fn up(key: Key) -> Self {
        Self::new(key, KeyDirection::Up)
    }
}

impl fmt::Display for KeyTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.key, self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_right_modifiers_are_normalized() {
        assert_eq!(Key::from_virtual_key(0xA2), Key::CONTROL);
        assert_eq!(Key::from_virtual_key(0xA3), Key::CONTROL);
        assert_eq!(Key::from_virtual_key(0xA1), Key::SHIFT);
        assert_eq!(Key::from_virtual_key(0xA5), Key::ALT);
        assert_eq!(Key::from_virtual_key(0x5C), Key::WIN);
        assert_eq!(Key::from_virtual_key(0x4C).value(), 0x4C);
    }

    #[test]
    fn test_key_from_name() {
        assert_eq!(Key::from_name("ctrl").unwrap(), Key::CONTROL);
        assert_eq!(Key::from_name("L").unwrap().to_string(), "l");
        assert!(matches!(
            Key::from_name("nope"),
            Err(FocusLockError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_exact_modifier_match() {
        let required = ModifierSet::CONTROL | ModifierSet::SHIFT;

        assert!(required.matches_exactly(ModifierSet::SHIFT | ModifierSet::CONTROL));
        // Не хватает Shift
        assert!(!required.matches_exactly(ModifierSet::CONTROL));
        // Лишний Alt
        assert!(!required.matches_exactly(required | ModifierSet::ALT));
        assert!(ModifierSet::empty().matches_exactly(ModifierSet::empty()));
        assert!(!ModifierSet::empty().matches_exactly(ModifierSet::SUPER));
    }

    #[test]
    fn test_modifiers_from_names_and_display() {
        let mods = ModifierSet::from_names(&["Shift", "ctrl"]).unwrap();
        assert_eq!(mods, ModifierSet::CONTROL | ModifierSet::SHIFT);
        assert_eq!(mods.to_string(), "ctrl+shift");
        assert_eq!(ModifierSet::empty().to_string(), "none");
        assert!(ModifierSet::from_names(&["hyper"]).is_err());
    }

    #[test]
    fn test_modifier_insert_remove() {
        let mut mods = ModifierSet::empty();
        mods.insert(ModifierSet::ALT);
        assert!(mods.contains(ModifierSet::ALT));
        mods.remove(ModifierSet::ALT);
        assert!(mods.is_empty());
    }
}
