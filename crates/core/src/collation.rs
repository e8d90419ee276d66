//! Name ordering shared by every read path.
//!
//! Names compare case- and accent-insensitively, and runs of digits compare
//! by numeric value, so "Room 9" sorts before "Room 10" and "Émile" sits
//! between "Elsa" and "Emma". A database's byte-order sort
//! does not agree with this, which is why ordered remote reads are still
//! sorted through [`sort_contacts`].

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::contact::Contact;

#[derive(Debug, PartialEq, Eq)]
enum Chunk {
    Digits(String),
    Text(String),
}

struct Chunks<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let first = *self.chars.peek()?;
        let digits = first.is_ascii_digit();
        let mut run = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() != digits {
                break;
            }
            run.push(c);
            self.chars.next();
        }
        Some(if digits {
            Chunk::Digits(run)
        } else {
            Chunk::Text(run)
        })
    }
}

/// Primary collation key: canonical decomposition with combining marks
/// dropped, lowercased.
fn fold(s: &str) -> String {
    s.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn chunks(s: &str) -> Chunks<'_> {
    Chunks {
        chars: s.chars().peekable(),
    }
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_chunk(a: &Chunk, b: &Chunk) -> Ordering {
    match (a, b) {
        (Chunk::Digits(x), Chunk::Digits(y)) => compare_digits(x, y),
        (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
        // Digits sort ahead of letters.
        (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
        (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
    }
}

/// Case- and accent-insensitive, numeric-aware comparison. Two names that
/// differ only in case, diacritics or leading zeros compare equal.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let (a, b) = (fold(a), fold(b));
    let mut left = chunks(&a);
    let mut right = chunks(&b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare_chunk(&x, &y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Total order over contacts: collated name, then raw name, then id.
pub fn compare_contacts(a: &Contact, b: &Contact) -> Ordering {
    compare_names(&a.name, &b.name)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_contacts(contacts: &mut [Contact]) {
    contacts.sort_by(compare_contacts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::ContactDraft;
    use crate::ids::ContactId;

    fn contact(id: &str, name: &str) -> Contact {
        ContactDraft::new(name).into_contact(ContactId::from(id), String::new())
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(compare_names("alice", "Alice"), Ordering::Equal);
        assert_eq!(compare_names("bob", "Alice"), Ordering::Greater);
        assert_eq!(compare_names("Émile", "émile"), Ordering::Equal);
    }

    #[test]
    fn accented_names_sort_with_their_base_letters() {
        let mut names = ["Zoe", "Émile", "Emma", "Ölaf", "Oscar"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, ["Émile", "Emma", "Ölaf", "Oscar", "Zoe"]);
        assert_eq!(compare_names("Émile", "emile"), Ordering::Equal);
        assert_eq!(compare_names("Ångström", "Angstrom"), Ordering::Equal);
    }

    #[test]
    fn accent_ties_break_on_raw_name() {
        let mut contacts = vec![contact("1", "Émile"), contact("2", "Emile")];
        sort_contacts(&mut contacts);
        let names: Vec<&str> = contacts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Emile", "Émile"]);
    }

    #[test]
    fn numeric_runs_compare_by_value() {
        assert_eq!(compare_names("Room 9", "Room 10"), Ordering::Less);
        assert_eq!(compare_names("Room 010", "Room 10"), Ordering::Equal);
        assert_eq!(compare_names("Contact 2", "Contact 11"), Ordering::Less);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(compare_names("Ann", "Anna"), Ordering::Less);
        assert_eq!(compare_names("", "Ann"), Ordering::Less);
    }

    #[test]
    fn sort_is_total_and_deterministic() {
        let mut a = vec![
            contact("3", "bob"),
            contact("2", "Bob"),
            contact("1", "Bob"),
            contact("4", "alice"),
        ];
        let mut b = a.clone();
        b.reverse();
        sort_contacts(&mut a);
        sort_contacts(&mut b);
        assert_eq!(a, b);
        let ids: Vec<&str> = a.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "1", "2", "3"]);
    }
}
