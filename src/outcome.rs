//! Decodes the dice contract's `Played` event out of a transaction's logs.
//!
//! A receipt can carry logs from any contract touched by the transaction, so
//! the decoder iterates all entries and skips anything that does not match
//! the expected schema. A malformed or unrelated log is never an error here.

use crate::chain::{Address, LogEntry};

pub const PLAYED_EVENT: &str = "Played(address,uint256,bool,bool,bool)";

const WORD: usize = 32;
const PLAYED_WORDS: usize = 5;

/// The dice contract's settlement event, as emitted on-chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayedEvent {
    pub player: Address,
    pub amount: u128,
    pub guess_even: bool,
    pub result_even: bool,
    pub win: bool,
}

/// Returns the first decodable `Played` event emitted by `dice`, or `None`
/// when the logs carry no such event.
pub fn decode_played(logs: &[LogEntry], dice: Address) -> Option<PlayedEvent> {
    logs.iter().find_map(|log| decode_one(log, dice))
}

fn decode_one(log: &LogEntry, dice: Address) -> Option<PlayedEvent> {
    if log.source != dice || log.event != PLAYED_EVENT {
        return None;
    }
    if log.data.len() != PLAYED_WORDS * WORD {
        return None;
    }
    let word = |i: usize| &log.data[i * WORD..(i + 1) * WORD];
    Some(PlayedEvent {
        player: word_address(word(0))?,
        amount: word_u128(word(1))?,
        guess_even: word_bool(word(2))?,
        result_even: word_bool(word(3))?,
        win: word_bool(word(4))?,
    })
}

fn word_address(word: &[u8]) -> Option<Address> {
    if word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&word[12..]);
    Some(Address(out))
}

fn word_u128(word: &[u8]) -> Option<u128> {
    if word[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&word[16..]);
    Some(u128::from_be_bytes(out))
}

fn word_bool(word: &[u8]) -> Option<bool> {
    if word[..31].iter().any(|b| *b != 0) {
        return None;
    }
    match word[31] {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

impl PlayedEvent {
    /// Word-encodes the event as the dice contract emits it. Shared with the
    /// in-memory chain used by tests and the demo.
    pub fn encode(&self, source: Address) -> LogEntry {
        let mut data = Vec::with_capacity(PLAYED_WORDS * WORD);
        data.extend_from_slice(&address_word(self.player));
        data.extend_from_slice(&u128_word(self.amount));
        data.extend_from_slice(&bool_word(self.guess_even));
        data.extend_from_slice(&bool_word(self.result_even));
        data.extend_from_slice(&bool_word(self.win));
        LogEntry {
            source,
            event: PLAYED_EVENT.to_string(),
            data,
        }
    }
}

fn address_word(address: Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(&address.0);
    word
}

fn u128_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn bool_word(value: bool) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[31] = value as u8;
    word
}
