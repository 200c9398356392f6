//! Распознавание аккордов в потоке переходов клавиш.
//!
//! Чистая машина состояний: ничего не знает о системных хуках и получает
//! состояние модификаторов снаружи, в момент нажатия.

use crate::error::{FocusLockError, Result};
use crate::events::{Key, ModifierSet};
use smallvec::SmallVec;
use std::fmt;

type KeyList = SmallVec<[Key; 4]>;

/// Конфигурация аккорда: набор клавиш + требуемые модификаторы.
///
/// Копируется по значению при запуске сессии, поэтому последующие изменения
/// исходного списка не влияют на работающий перехватчик.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSpec {
    keys: Vec<Key>,
    modifiers: ModifierSet,
}

impl ChordSpec {
    pub fn new(keys: impl IntoIterator<Item = Key>, modifiers: ModifierSet) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            modifiers,
        }
    }

    pub fn single(key: Key, modifiers: ModifierSet) -> Self {
        Self::new([key], modifiers)
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn modifiers(&self) -> ModifierSet {
        self.modifiers
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Display for ChordSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.keys.iter().map(|k| k.to_string()).collect();
        write!(f, "[{}] (модификаторы: {})", keys.join("+"), self.modifiers)
    }
}

#[derive(Debug, Clone)]
pub struct ChordMatcher {
    // Эффективный набор клавиш без дубликатов, фиксирован на всю сессию
    keys: KeyList,
    modifiers: ModifierSet,
    // Инвариант: down_keys ⊆ keys
    down_keys: KeyList,
}

impl ChordMatcher {
    pub fn configure(keys: &[Key], modifiers: ModifierSet) -> Result<Self> {
        if keys.is_empty() {
            return FocusLockError::invalid_configuration("набор клавиш аккорда пуст");
        }

        let mut unique = KeyList::new();
        for key in keys {
            if !unique.contains(key) {
                unique.push(*key);
            }
        }

        Ok(Self {
            keys: unique,
            modifiers,
            down_keys: KeyList::new(),
        })
    }

    pub fn from_spec(spec: &ChordSpec) -> Result<Self> {
        Self::configure(spec.keys(), spec.modifiers())
    }

    /// Обработать нажатие. Возвращает `true`, если это нажатие активирует аккорд.
    pub fn on_key_down(&mut self, key: Key, live_modifiers: ModifierSet) -> bool {
        if !self.keys.contains(&key) {
            return false;
        }

        if self.is_single_key() {
            // Пока клавиша удерживается, автоповтор не должен активировать повторно
            if self.down_keys.is_empty() && self.modifiers.matches_exactly(live_modifiers) {
                self.down_keys.push(key);
                return true;
            }
            return false;
        }

        if self.down_keys.contains(&key) {
            return false;
        }

        self.down_keys.push(key);
        self.down_keys.len() == self.keys.len() && self.modifiers.matches_exactly(live_modifiers)
    }

    /// Обработать отпускание: сбрасывается только отпущенная клавиша.
    pub fn on_key_up(&mut self, key: Key) {
        if self.is_single_key() {
            if self.keys[0] == key {
                self.down_keys.clear();
            }
            return;
        }

        self.down_keys.retain(|k| *k != key);
    }

    pub fn reset(&mut self) {
        self.down_keys.clear();
    }

    #[allow(dead_code)]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    #[allow(dead_code)]
    pub fn down_keys(&self) -> &[Key] {
        &self.down_keys
    }

    fn is_single_key(&self) -> bool {
        self.keys.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Key {
        Key::from_name(name).unwrap()
    }

    #[test]
    fn test_empty_configuration_is_rejected() {
        let result = ChordMatcher::configure(&[], ModifierSet::empty());
        assert!(matches!(result, Err(FocusLockError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_keys_are_deduplicated() {
        let l = key("l");
        let matcher = ChordMatcher::configure(&[l, Key::CONTROL, l, Key::CONTROL], ModifierSet::CONTROL).unwrap();
        assert_eq!(matcher.keys(), &[l, Key::CONTROL]);
    }

    #[test]
    fn test_duplicates_collapse_to_single_key_mode() {
        let f9 = key("f9");
        let mut matcher = ChordMatcher::configure(&[f9, f9], ModifierSet::empty()).unwrap();
        assert!(matcher.on_key_down(f9, ModifierSet::empty()));
        assert!(!matcher.on_key_down(f9, ModifierSet::empty()));
    }

    #[test]
    fn test_single_key_chord_scenario() {
        let f9 = key("f9");
        let mut matcher = ChordMatcher::from_spec(&ChordSpec::single(f9, ModifierSet::empty())).unwrap();

        assert!(matcher.on_key_down(f9, ModifierSet::empty()));
        // Автоповтор без отпускания
        assert!(!matcher.on_key_down(f9, ModifierSet::empty()));
        assert!(!matcher.on_key_down(f9, ModifierSet::empty()));

        matcher.on_key_up(f9);
        assert!(matcher.on_key_down(f9, ModifierSet::empty()));
    }

    #[test]
    fn test_single_key_requires_exact_modifiers() {
        let f9 = key("f9");
        let mut matcher = ChordMatcher::configure(&[f9], ModifierSet::CONTROL).unwrap();

        assert!(!matcher.on_key_down(f9, ModifierSet::empty()));
        assert!(!matcher.on_key_down(f9, ModifierSet::CONTROL | ModifierSet::ALT));
        assert!(matcher.on_key_down(f9, ModifierSet::CONTROL));
    }

    #[test]
    fn test_multi_key_chord_scenario() {
        let l = key("l");
        let mods = ModifierSet::CONTROL | ModifierSet::SHIFT;
        let spec = ChordSpec::new([Key::CONTROL, Key::SHIFT, l], mods);
        let mut matcher = ChordMatcher::from_spec(&spec).unwrap();

        assert!(!matcher.on_key_down(Key::CONTROL, ModifierSet::empty()));
        assert!(!matcher.on_key_down(Key::SHIFT, ModifierSet::CONTROL));
        assert!(matcher.on_key_down(l, mods));

        // Повторное нажатие удерживаемой клавиши ничего не меняет
        assert!(!matcher.on_key_down(l, mods));
        assert_eq!(matcher.down_keys().len(), 3);

        matcher.on_key_up(l);
        assert_eq!(matcher.down_keys(), &[Key::CONTROL, Key::SHIFT]);
        assert!(matcher.on_key_down(l, mods));
    }

    #[test]
    fn test_multi_key_extra_modifier_blocks_activation() {
        let a = key("a");
        let b = key("b");
        let mut matcher = ChordMatcher::configure(&[a, b], ModifierSet::empty()).unwrap();

        assert!(!matcher.on_key_down(a, ModifierSet::ALT));
        assert!(!matcher.on_key_down(b, ModifierSet::ALT));

        // Отпустили одну клавишу и нажали заново уже без Alt
        matcher.on_key_up(b);
        assert!(matcher.on_key_down(b, ModifierSet::empty()));
    }

    #[test]
    fn test_foreign_keys_are_ignored() {
        let a = key("a");
        let b = key("b");
        let z = key("z");
        let mut matcher = ChordMatcher::configure(&[a, b], ModifierSet::empty()).unwrap();

        assert!(!matcher.on_key_down(z, ModifierSet::empty()));
        assert!(matcher.down_keys().is_empty());

        assert!(!matcher.on_key_down(a, ModifierSet::empty()));
        matcher.on_key_up(z);
        assert_eq!(matcher.down_keys(), &[a]);
        assert!(matcher.on_key_down(b, ModifierSet::empty()));
    }

    #[test]
    fn test_reset_clears_down_keys() {
        let a = key("a");
        let b = key("b");
        let mut matcher = ChordMatcher::configure(&[a, b], ModifierSet::empty()).unwrap();
        matcher.on_key_down(a, ModifierSet::empty());
        matcher.reset();
        assert!(matcher.down_keys().is_empty());
    }

    #[test]
    fn test_spec_is_copied_by_value() {
        let a = key("a");
        let mut source = vec![a];
        let spec = ChordSpec::new(source.clone(), ModifierSet::empty());
        let mut matcher = ChordMatcher::from_spec(&spec).unwrap();

        source.push(key("b"));
        assert_eq!(spec.keys(), &[a]);
        assert!(matcher.on_key_down(a, ModifierSet::empty()));
    }
}
