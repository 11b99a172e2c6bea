//! Whole-document edit script between two resource sequences.

use crate::document::ResourceDocument;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiffSign {
    #[serde(rename = "+")]
    Added,
    #[serde(rename = "-")]
    Removed,
}

impl DiffSign {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "+",
            Self::Removed => "-",
        }
    }
}

impl fmt::Display for DiffSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edit: a document present on only one side.
///
/// For `-` entries `path` indexes the left-hand sequence, for `+` entries the
/// right-hand one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub sign: DiffSign,
    pub path: String,
    pub value: ResourceDocument,
}

impl DiffEntry {
    fn removed(index: usize, value: &ResourceDocument) -> Self {
        Self {
            sign: DiffSign::Removed,
            path: format!("[{index}]"),
            value: value.clone(),
        }
    }

    fn added(index: usize, value: &ResourceDocument) -> Self {
        Self {
            sign: DiffSign::Added,
            path: format!("[{index}]"),
            value: value.clone(),
        }
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}/{}",
            self.sign,
            self.path,
            self.value.kind().unwrap_or("<no kind>"),
            self.value.name().unwrap_or("<no name>")
        )
    }
}

/// Minimal ordered edit script turning `old` into `new`.
///
/// Documents are compared whole. Shared prefix and suffix are skipped before
/// the LCS table is built over what remains. Removals are emitted before
/// additions at each change point.
pub(crate) fn diff_documents(old: &[ResourceDocument], new: &[ResourceDocument]) -> Vec<DiffEntry> {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];
    let (n, m) = (old_mid.len(), new_mid.len());

    // lcs[i][j] = LCS length of old_mid[i..] and new_mid[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old_mid[i] == new_mid[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut entries = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old_mid[i] == new_mid[j] {
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            entries.push(DiffEntry::removed(prefix + i, &old_mid[i]));
            i += 1;
        } else {
            entries.push(DiffEntry::added(prefix + j, &new_mid[j]));
            j += 1;
        }
    }
    entries.extend((i..n).map(|k| DiffEntry::removed(prefix + k, &old_mid[k])));
    entries.extend((j..m).map(|k| DiffEntry::added(prefix + k, &new_mid[k])));
    entries
}
