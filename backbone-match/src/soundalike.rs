//! Phonetic key for scientific names
//!
//! Letter groups that sound alike in latin names are folded onto one
//! spelling, so misspellings like "Cyclops"/"Ciclops" or "Knautia"/"Nautia"
//! share a key. Applied word by word on lower case input.

/// Leading letter groups and their replacement, checked in order
const LEADING: [(&str, &str); 18] = [
    ("ae", "e"),
    ("cn", "n"),
    ("ct", "t"),
    ("cz", "c"),
    ("dj", "d"),
    ("ea", "e"),
    ("eu", "u"),
    ("gn", "n"),
    ("kn", "n"),
    ("mc", "mac"),
    ("mn", "n"),
    ("oe", "e"),
    ("qu", "q"),
    ("ps", "s"),
    ("pt", "t"),
    ("ts", "s"),
    ("wr", "r"),
    ("x", "z"),
];

/// Sound-alike key of a whole name
pub fn sound_alike(name: &str) -> String {
    name.split_whitespace()
        .map(|w| sound_alike_word(&w.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn sound_alike_word(word: &str) -> String {
    let word = if word.chars().count() > 2 {
        LEADING
            .iter()
            .find(|(from, _)| word.starts_with(from))
            .map(|(from, to)| format!("{}{}", to, &word[from.len()..]))
            .unwrap_or_else(|| word.to_string())
    } else {
        word.to_string()
    };

    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return word;
    };

    // The leading letter is kept verbatim
    let mut out = String::with_capacity(word.len());
    out.push(first);
    let mut previous = first;
    for c in chars {
        let mapped = match c {
            'a' if previous == 'i' => {
                pop_tail(&mut out);
                Some('a')
            }
            'c' if previous == 's' => None,
            'e' => {
                if previous == 'a' || previous == 'o' {
                    pop_tail(&mut out);
                }
                Some('i')
            }
            'u' | 'y' => Some('i'),
            'k' => Some('c'),
            'z' => Some('s'),
            'h' => None,
            other => Some(other),
        };
        previous = c;
        if let Some(m) = mapped {
            if !out.ends_with(m) {
                out.push(m);
            }
        }
    }
    out
}

/// Drop the last folded letter, never the leading one
fn pop_tail(out: &mut String) {
    if out.chars().count() > 1 {
        out.pop();
    }
}
