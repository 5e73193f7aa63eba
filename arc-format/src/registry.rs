//! Checksum universe and the plaintext dictionary recovered for it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{BufRead, Write};
use std::ops::RangeInclusive;

use crate::hash::HashKey;
use crate::progress::{NoProgress, Progress};

/// Marks a template slot; text containing it is never a real path.
pub const WILDCARD: char = '%';

/// A candidate string that matched an unresolved checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub key: HashKey,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coverage {
    pub known: usize,
    pub total: usize,
}

impl Coverage {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.known as f64 / self.total as f64
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} ({:.2}%)",
            self.known,
            self.total,
            self.ratio() * 100.0
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFilter {
    All,
    Unknown,
}

/// The checksum universe of one archive, the dictionary mapping checksums to
/// text, and the subset of the dictionary discovered during this session.
#[derive(Debug, Default, Clone)]
pub struct HashRegistry {
    universe: HashSet<HashKey>,
    strings: HashMap<HashKey, String>,
    new_strings: HashMap<HashKey, String>,
}

impl HashRegistry {
    pub fn new(universe: HashSet<HashKey>) -> HashRegistry {
        HashRegistry {
            universe,
            ..Default::default()
        }
    }

    pub fn from_seed<I, S>(universe: HashSet<HashKey>, seed: I) -> HashRegistry
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = HashRegistry::new(universe);
        registry.register_seed_dictionary(seed);
        registry
    }

    /// Inserts externally supplied strings, lowercased. A key that already has
    /// text keeps it. Returns the number of strings inserted.
    pub fn register_seed_dictionary<I, S>(&mut self, strings: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for s in strings {
            let text = s.as_ref().to_lowercase();
            let key = match HashKey::checked(&text) {
                Some(key) => key,
                None => continue,
            };
            if let std::collections::hash_map::Entry::Vacant(e) = self.strings.entry(key) {
                e.insert(text);
                count += 1;
            }
        }
        count
    }

    /// Seeds from newline-delimited text. Blank lines are skipped.
    pub fn load_dictionary<R: BufRead>(&mut self, reader: R) -> std::io::Result<usize> {
        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }

        let count = self.register_seed_dictionary(&lines);
        tracing::debug!(lines = lines.len(), inserted = count, "loaded dictionary");
        Ok(count)
    }

    /// Whether `candidate` would be a new discovery. Does not modify the
    /// registry.
    pub fn probe(&self, candidate: &str) -> Option<Discovery> {
        if candidate.contains(WILDCARD) {
            return None;
        }

        let text = candidate.to_lowercase();
        let key = HashKey::checked(&text)?;

        if self.universe.contains(&key) && !self.strings.contains_key(&key) {
            Some(Discovery { key, text })
        } else {
            None
        }
    }

    /// Records a discovery from [`HashRegistry::probe`].
    pub fn learn(&mut self, discovery: Discovery) -> bool {
        if self.strings.contains_key(&discovery.key) {
            return false;
        }

        tracing::info!(key = %discovery.key, "found new hash {}", discovery.text);
        self.new_strings
            .insert(discovery.key, discovery.text.clone());
        self.strings.insert(discovery.key, discovery.text);
        true
    }

    pub fn try_register_if_known(&mut self, candidate: &str) -> bool {
        match self.probe(candidate) {
            Some(discovery) => self.learn(discovery),
            None => false,
        }
    }

    #[inline]
    pub fn text(&self, key: HashKey) -> Option<&str> {
        self.strings.get(&key).map(String::as_str)
    }

    /// Text for `key`, treating whitespace-only text as absent.
    #[inline]
    pub(crate) fn meaningful_text(&self, key: HashKey) -> Option<&str> {
        self.text(key).filter(|x| !x.trim().is_empty())
    }

    #[inline]
    pub fn is_known(&self, key: HashKey) -> bool {
        self.strings.contains_key(&key)
    }

    /// Whether `key` occurs anywhere in the archive.
    #[inline]
    pub fn contains(&self, key: HashKey) -> bool {
        self.universe.contains(&key)
    }

    /// Removes `key` from the dictionary and the discovered set.
    pub fn evict(&mut self, key: HashKey) -> Option<String> {
        self.new_strings.remove(&key);
        self.strings.remove(&key)
    }

    #[inline(always)]
    pub fn universe(&self) -> &HashSet<HashKey> {
        &self.universe
    }

    #[inline(always)]
    pub fn new_strings(&self) -> &HashMap<HashKey, String> {
        &self.new_strings
    }

    /// Number of strings in the dictionary, including ones outside the universe.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn coverage(&self) -> Coverage {
        self.coverage_of(self.universe.iter().copied())
    }

    /// Known/total over an arbitrary set of keys.
    pub fn coverage_of<I: IntoIterator<Item = HashKey>>(&self, keys: I) -> Coverage {
        keys.into_iter().fold(Coverage::default(), |mut acc, key| {
            acc.total += 1;
            if self.is_known(key) {
                acc.known += 1;
            }
            acc
        })
    }

    /// Every string of exactly `len` bytes drawn from `range`, in
    /// lexicographic order.
    pub fn brute_force(&mut self, len: usize, range: RangeInclusive<u8>) -> Vec<String> {
        self.brute_force_with_progress(len, range, &mut NoProgress)
    }

    pub fn brute_force_with_progress(
        &mut self,
        len: usize,
        range: RangeInclusive<u8>,
        progress: &mut dyn Progress,
    ) -> Vec<String> {
        self.fill_template_with_progress("%s", len, range, progress)
    }

    /// Brute-forces the first `%s` in `template` with strings of `len` bytes.
    pub fn fill_template(
        &mut self,
        template: &str,
        len: usize,
        range: RangeInclusive<u8>,
    ) -> Vec<String> {
        self.fill_template_with_progress(template, len, range, &mut NoProgress)
    }

    pub fn fill_template_with_progress(
        &mut self,
        template: &str,
        len: usize,
        range: RangeInclusive<u8>,
        progress: &mut dyn Progress,
    ) -> Vec<String> {
        let mut found = Vec::new();
        let (low, high) = (*range.start(), *range.end());

        let (prefix, suffix) = match template.find("%s") {
            Some(i) => (&template[..i], &template[i + 2..]),
            None => return found,
        };
        if len == 0 || low > high || prefix.len() + len + suffix.len() > u8::MAX as usize {
            return found;
        }

        let mut buf = Vec::with_capacity(prefix.len() + len + suffix.len());
        buf.extend_from_slice(prefix.as_bytes());
        buf.extend(std::iter::repeat(low).take(len));
        buf.extend_from_slice(suffix.as_bytes());
        let slot = prefix.len()..prefix.len() + len;

        progress.set_total(high as u64 - low as u64 + 1);

        loop {
            let key = HashKey::of_bytes(&buf);
            if self.universe.contains(&key) && !self.strings.contains_key(&key) {
                if let Ok(text) = std::str::from_utf8(&buf) {
                    if self.try_register_if_known(text) {
                        progress.log_message(&format!("Found new hash {}", text.to_lowercase()));
                        found.push(text.to_lowercase());
                    }
                }
            }

            let chars = &mut buf[slot.clone()];
            let mut i = chars.len();
            loop {
                if i == 0 {
                    progress.report_add(1);
                    return found;
                }
                i -= 1;
                if chars[i] == high {
                    chars[i] = low;
                } else {
                    chars[i] += 1;
                    break;
                }
            }

            if i == 0 {
                progress.report_add(1);
            }
        }
    }

    /// Tries `line` and every component and prefix produced by splitting it
    /// on `/`, `_` and `.`, with and without the trailing delimiter.
    pub fn register_split_components(&mut self, line: &str) -> usize {
        let mut count = self.try_register_if_known(line) as usize;

        for delimiter in ['/', '_', '.'] {
            let mut combined = String::with_capacity(line.len() + 1);
            for part in line.split(delimiter) {
                combined.push_str(part);
                count += self.try_register_if_known(part) as usize;
                count += self.try_register_if_known(&combined) as usize;
                combined.push(delimiter);
                count += self.try_register_if_known(&combined) as usize;
            }
        }

        count
    }

    /// Tries every known string with each extension appended.
    pub fn register_with_extensions<S: AsRef<str>>(&mut self, extensions: &[S]) -> usize {
        let known: Vec<String> = self.strings.values().cloned().collect();
        let mut count = 0;

        for s in &known {
            for ext in extensions {
                count += self.try_register_if_known(&format!("{}.{}", s, ext.as_ref())) as usize;
            }
        }

        tracing::debug!(strings = known.len(), count, "tried known extensions");
        count
    }

    /// Substitutes other known strings into `%s` templates, `00`..`07` into
    /// `%02d` templates and costume slots `c00`..`c07` for `c00`.
    pub fn expand_templates(&mut self) -> usize {
        let known: Vec<String> = self.strings.values().cloned().collect();
        let mut count = 0;

        for template in &known {
            if template.contains("%s") {
                for s in &known {
                    count += self.try_register_if_known(&template.replace("%s", s)) as usize;
                }
            }

            if template.contains("%02d") {
                for i in 0..8 {
                    count += self
                        .try_register_if_known(&template.replace("%02d", &format!("{:02}", i)))
                        as usize;
                }
            }

            if template.contains("c00") {
                for i in 1..8 {
                    count += self
                        .try_register_if_known(&template.replace("c00", &format!("c{:02}", i)))
                        as usize;
                }
            }
        }

        count
    }

    /// Writes every known string whose checksum is in the universe, ordered
    /// by length then text.
    pub fn write_dictionary<W: Write>(&self, mut writer: W) -> std::io::Result<usize> {
        let mut strings: Vec<&str> = self
            .strings
            .iter()
            .filter(|(k, _)| self.universe.contains(k))
            .map(|(_, v)| v.as_str())
            .collect();
        strings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        for s in &strings {
            writeln!(writer, "{}", s)?;
        }
        Ok(strings.len())
    }

    /// Writes `LL-CCCCCCCC` lines, ordered by key.
    pub fn write_hashes<W: Write>(&self, mut writer: W, filter: HashFilter) -> std::io::Result<usize> {
        let mut keys: Vec<HashKey> = self
            .universe
            .iter()
            .copied()
            .filter(|k| filter == HashFilter::All || !self.is_known(*k))
            .collect();
        keys.sort_by_key(|k| k.raw());

        for key in &keys {
            writeln!(writer, "{:02X}-{:08X}", key.len(), key.crc())?;
        }
        Ok(keys.len())
    }
}
