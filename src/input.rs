use glam::Vec2;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    /// Resolves a key name as written in configuration files: `"Space"`,
    /// `"c"`, `"7"`, `"F5"`.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(Self::Character(ch.to_ascii_uppercase()));
            }
            if let Some(digit) = ch.to_digit(10) {
                return Some(Self::Digit(digit as u8));
            }
        }
        let function = name.strip_prefix('F').or_else(|| name.strip_prefix('f'))?;
        match function.parse::<u8>() {
            Ok(index @ 1..=24) => Some(Self::Function(index)),
            _ => None,
        }
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "Escape" | "Esc" => Escape,
        "Backspace" => Backspace,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        "LeftAlt" | "LAlt" => LeftAlt,
        "RightAlt" | "RAlt" => RightAlt,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Keys that have a name rather than a printable character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Backspace,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
}

/// Input gathered from window and device events since the last update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    /// Pointer motion in device units, +Y pointing down the screen.
    pub pointer_delta: Vec2,
    /// Wheel ticks, positive when scrolling away from the user.
    pub wheel_ticks: f32,
    pub pressed: Vec<KeyCode>,
}

impl FrameInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pointer_motion(&mut self, dx: f32, dy: f32) {
        self.pointer_delta += Vec2::new(dx, dy);
    }

    pub fn add_wheel_ticks(&mut self, ticks: f32) {
        self.wheel_ticks += ticks;
    }

    pub fn press(&mut self, key: KeyCode) {
        self.pressed.push(key);
    }

    /// Returns the accumulated input and resets the accumulator.
    pub fn take(&mut self) -> FrameInput {
        std::mem::take(self)
    }
}
