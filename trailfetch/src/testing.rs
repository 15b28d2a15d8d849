//! In-memory object source used by the unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::paginate::Page;
use crate::source::{ListObjects, Transfer};
use crate::{Error, Result};

#[derive(Debug)]
pub(crate) struct MockSource {
    objects: BTreeMap<String, Vec<u8>>,
    page_size: usize,
    broken_prefixes: HashSet<String>,
    hanging: HashSet<String>,
    /// Remaining number of failures per key.
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockSource {
    /// A source serving each key with its own name as payload.
    pub fn with_objects<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            objects: keys.into_iter().map(|key| (key.to_owned(), key.as_bytes().to_vec())).collect(),
            page_size: 1_000,
            broken_prefixes: HashSet::new(),
            hanging: HashSet::new(),
            failures: Mutex::default(),
            calls: Mutex::default(),
        }
    }

    /// A source serving each key with a gzip archive of `payload`.
    pub fn with_archives<'a>(keys: impl IntoIterator<Item = &'a str>, payload: &[u8]) -> Self {
        let mut source = Self::with_objects(keys);
        let archive = gzip(payload);
        source.objects.values_mut().for_each(|data| data.clone_from(&archive));
        source
    }

    pub fn page_size(self, page_size: usize) -> Self {
        Self { page_size, ..self }
    }

    pub fn failing<'a>(self, keys: impl IntoIterator<Item = &'a str>, times: usize) -> Self {
        self.failures.lock().unwrap().extend(keys.into_iter().map(|key| (key.to_owned(), times)));
        self
    }

    pub fn hanging<'a>(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        self.hanging.extend(keys.into_iter().map(str::to_owned));
        self
    }

    pub fn broken_listing(mut self, prefix: &str) -> Self {
        self.broken_prefixes.insert(prefix.to_owned());
        self
    }

    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl ListObjects for MockSource {
    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<Page<String>> {
        if self.broken_prefixes.contains(prefix) {
            return Err(Error::provider(format!("access denied to `{prefix}`")));
        }

        let offset = token.map_or(0, |token| token.parse().unwrap());
        let keys: Vec<_> = self.objects.keys().filter(|key| key.starts_with(prefix)).cloned().collect();
        let end = keys.len().min(offset + self.page_size);
        let next_token = (end < keys.len()).then(|| end.to_string());

        Ok(Page::new(keys[offset..end].to_vec(), next_token))
    }
}

impl Transfer for MockSource {
    async fn fetch(&self, key: &str, path: &Path) -> Result<()> {
        *self.calls.lock().unwrap().entry(key.to_owned()).or_default() += 1;

        if self.hanging.contains(key) {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        }

        let failing = match self.failures.lock().unwrap().get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };

        if failing {
            return Err(Error::provider(format!("connection reset while fetching `{key}`")));
        }

        let data = self.objects.get(key).ok_or_else(|| Error::provider(format!("no such key `{key}`")))?;

        tokio::fs::write(path, data).await?;

        Ok(())
    }
}

pub(crate) fn gzip(payload: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(vec![], flate2::Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}
