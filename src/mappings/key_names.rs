use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Преобразование имён клавиш из конфигурации в виртуальные коды Windows (VK_*)
pub struct KeyNames;

// Статическая карта клавиш: имя -> VK код
static KEY_NAME_TO_VK: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Буквенные клавиши: VK коды совпадают с ASCII заглавных букв
    const LETTERS: [&str; 26] = [
        "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q",
        "r", "s", "t", "u", "v", "w", "x", "y", "z",
    ];
    for (i, name) in LETTERS.iter().enumerate() {
        map.insert(*name, 0x41 + i as u16);
    }

    // Цифровые клавиши (верхний ряд)
    const DIGITS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
    for (i, name) in DIGITS.iter().enumerate() {
        map.insert(*name, 0x30 + i as u16);
    }

    // Функциональные клавиши F1..F24
    const FUNCTION_KEYS: [&str; 24] = [
        "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "f13",
        "f14", "f15", "f16", "f17", "f18", "f19", "f20", "f21", "f22", "f23", "f24",
    ];
    for (i, name) in FUNCTION_KEYS.iter().enumerate() {
        map.insert(*name, 0x70 + i as u16);
    }

    // Специальные клавиши
    map.insert("backspace", 0x08); // VK_BACK
    map.insert("tab", 0x09); // VK_TAB
    map.insert("enter", 0x0D); // VK_RETURN
    map.insert("pause", 0x13); // VK_PAUSE
    map.insert("capslock", 0x14); // VK_CAPITAL
    map.insert("escape", 0x1B); // VK_ESCAPE
    map.insert("space", 0x20); // VK_SPACE
    map.insert("pageup", 0x21); // VK_PRIOR
    map.insert("pagedown", 0x22); // VK_NEXT
    map.insert("end", 0x23); // VK_END
    map.insert("home", 0x24); // VK_HOME
    map.insert("insert", 0x2D); // VK_INSERT
    map.insert("delete", 0x2E); // VK_DELETE

    // Стрелки
    map.insert("left", 0x25); // VK_LEFT
    map.insert("up", 0x26); // VK_UP
    map.insert("right", 0x27); // VK_RIGHT
    map.insert("down", 0x28); // VK_DOWN

    // Модификаторы (обобщённые, без разделения на левый/правый)
    map.insert("shift", 0x10); // VK_SHIFT
    map.insert("ctrl", 0x11); // VK_CONTROL
    map.insert("alt", 0x12); // VK_MENU
    map.insert("win", 0x5B); // VK_LWIN

    map
});

static VK_TO_KEY_NAME: Lazy<HashMap<u16, &'static str>> =
    Lazy::new(|| KEY_NAME_TO_VK.iter().map(|(&name, &vk)| (vk, name)).collect());

// Синонимы, которые встречаются в конфигурациях
const ALIASES: [(&str, &str); 7] = [
    ("control", "ctrl"),
    ("menu", "alt"),
    ("super", "win"),
    ("meta", "win"),
    ("return", "enter"),
    ("esc", "escape"),
    ("del", "delete"),
];

impl KeyNames {
    /// Получить VK код по имени клавиши (регистронезависимо)
    pub fn vk_code(key_name: &str) -> Option<u16> {
        let normalized = key_name.trim().to_lowercase();
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, name)| *name)
            .unwrap_or(normalized.as_str());
        KEY_NAME_TO_VK.get(canonical).copied()
    }

    /// Получить каноническое имя клавиши по VK коду
    pub fn name(vk: u16) -> Option<&'static str> {
        VK_TO_KEY_NAME.get(&vk).copied()
    }
}
