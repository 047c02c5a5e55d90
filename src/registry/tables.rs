use super::Signal;

/// Version of the listing styling these tables were captured against.
pub const TABLE_VERSION: &str = "2022-08";

/// Star widget class token → star count. The listing ships two colour
/// variants of the same widget, hence two tokens per score.
pub const STAR_TOKENS: &[(&str, u8)] = &[
    ("css-152xdkl", 1),
    ("css-19o85uz", 2),
    ("css-1ihykkv", 3),
    ("css-1c07csa", 4),
    ("css-1dc0bv4", 5),
    ("css-xd4dom", 1),
    ("css-18v8tui", 2),
    ("css-vl2edp", 3),
    ("css-1nuumx7", 4),
    ("css-s88v13", 5),
];

/// Recommendation icon class token → signal.
pub const SIGNAL_TOKENS: &[(&str, Signal)] = &[
    ("css-hcqxoa-svg", Signal::Yes),       // check mark
    ("css-1kiw93k-svg", Signal::No),       // cross
    ("css-1h93d4v-svg", Signal::Neutral),  // line
    ("css-10xv9lv-svg", Signal::Unmarked), // empty circle
];

pub fn stars(token: &str) -> Option<u8> {
    lookup(STAR_TOKENS, token)
}

pub fn signal(token: &str) -> Option<Signal> {
    lookup(SIGNAL_TOKENS, token)
}

fn lookup<T: Copy>(table: &[(&str, T)], token: &str) -> Option<T> {
    table.iter().find(|(t, _)| *t == token).map(|(_, v)| *v)
}
