//! Prefixed random identities for stored rows.

use rand::Rng;

/// Visually unambiguous alphabet: no `0`, `O`, `I` or `l`.
pub const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
pub const ID_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    QuizSet,
    Quiz,
    QuizOption,
}

impl EntityKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::QuizSet => "qs",
            Self::Quiz => "q",
            Self::QuizOption => "qo",
        }
    }
}

/// `{prefix}_{16 random chars}`, drawn from the thread-local CSPRNG.
pub fn new_id(kind: EntityKind) -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(kind.prefix().len() + 1 + ID_LEN);
    id.push_str(kind.prefix());
    id.push('_');
    for _ in 0..ID_LEN {
        id.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
    }
    id
}
