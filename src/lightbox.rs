//! The gallery lightbox as a plain state machine. A [`Lightbox`] is one open
//! overlay over a gallery of `len` images; navigation wraps around in both
//! directions. Closing is reported as [`Action::Close`]; the caller drops the
//! instance then, so every open starts fresh from [`Lightbox::open`].

use std::str::FromStr;

/// One open lightbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lightbox {
    len: usize,
    index: usize,
}

/// The overlay's buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Previous,
    Next,
    Close,
}

/// Keys the overlay responds to. Left/right/escape mirror the buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Escape,
    Other,
}

/// What the overlay should do after an input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Show the image at this index.
    Show(usize),

    /// Remove the overlay and restore background scrolling.
    Close,

    /// Nothing changes.
    Ignore,
}

impl Lightbox {
    /// Opens the lightbox on the clicked thumbnail. Returns `None` for an
    /// empty gallery or an index past its end.
    pub fn open(len: usize, index: usize) -> Option<Lightbox> {
        match index < len {
            true => Some(Lightbox { len, index }),
            false => None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn next(&mut self) -> usize {
        self.index = (self.index + 1) % self.len;
        self.index
    }

    pub fn previous(&mut self) -> usize {
        self.index = (self.index + self.len - 1) % self.len;
        self.index
    }

    pub fn on_button(&mut self, button: Button) -> Action {
        match button {
            Button::Previous => Action::Show(self.previous()),
            Button::Next => Action::Show(self.next()),
            Button::Close => Action::Close,
        }
    }

    pub fn on_key(&mut self, key: Key) -> Action {
        match key {
            Key::ArrowLeft => self.on_button(Button::Previous),
            Key::ArrowRight => self.on_button(Button::Next),
            Key::Escape => self.on_button(Button::Close),
            Key::Other => Action::Ignore,
        }
    }

    /// The indexes the previous and next buttons lead to, without moving.
    pub fn neighbors(&self) -> (usize, usize) {
        let (mut previous, mut next) = (*self, *self);
        (previous.previous(), next.next())
    }

    /// The `3 / 5`-style position shown under the image.
    pub fn counter(&self) -> String {
        format!("{} / {}", self.index + 1, self.len)
    }
}

impl Key {
    /// The DOM key name for keys with an action.
    pub fn name(self) -> &'static str {
        match self {
            Key::ArrowLeft => "ArrowLeft",
            Key::ArrowRight => "ArrowRight",
            Key::Escape => "Escape",
            Key::Other => "",
        }
    }
}

impl FromStr for Key {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "Escape" | "Esc" => Key::Escape,
            _ => Key::Other,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_open_bounds() {
        assert_eq!(None, Lightbox::open(0, 0));
        assert_eq!(None, Lightbox::open(3, 3));
        assert_eq!(Some(2), Lightbox::open(3, 2).map(|l| l.index()));
    }

    #[test]
    fn test_next_wraps() {
        let mut lightbox = Lightbox::open(3, 2).unwrap();
        assert_eq!(Action::Show(0), lightbox.on_button(Button::Next));
        assert_eq!("1 / 3", lightbox.counter());
    }

    #[test]
    fn test_previous_wraps() {
        let mut lightbox = Lightbox::open(3, 0).unwrap();
        assert_eq!(Action::Show(2), lightbox.on_button(Button::Previous));
    }

    #[test]
    fn test_keys_mirror_buttons() {
        let mut lightbox = Lightbox::open(3, 1).unwrap();
        assert_eq!(Action::Show(2), lightbox.on_key("ArrowRight".parse().unwrap()));
        assert_eq!(Action::Show(1), lightbox.on_key(Key::ArrowLeft));
        assert_eq!(Action::Ignore, lightbox.on_key("Enter".parse().unwrap()));
        assert_eq!(1, lightbox.index());
        assert_eq!(Action::Close, lightbox.on_key(Key::Escape));
    }

    #[test]
    fn test_single_image_gallery() {
        let mut lightbox = Lightbox::open(1, 0).unwrap();
        assert_eq!(0, lightbox.next());
        assert_eq!(0, lightbox.previous());
    }

    #[test]
    fn test_neighbors_do_not_move() {
        let lightbox = Lightbox::open(4, 0).unwrap();
        assert_eq!((3, 1), lightbox.neighbors());
        assert_eq!(0, lightbox.index());
    }

    #[test]
    fn test_close_leaves_position_for_the_caller() {
        let mut lightbox = Lightbox::open(3, 1).unwrap();
        lightbox.next();
        assert_eq!(Action::Close, lightbox.on_button(Button::Close));
        assert_eq!(2, lightbox.index());
        assert_eq!(Some(0), Lightbox::open(3, 0).map(|l| l.index()));
    }
}
