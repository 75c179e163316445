// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Include/exclude path policy for downloads
//!
//! A pattern matches a path when any of these hold:
//!
//! - the glob matches the whole path (`*` does not cross `/`)
//! - the glob matches a leading directory of the path (`assets` covers `assets/a/b.psd`)
//! - the pattern has no `/` and matches the file name (`*.bin` covers `deep/dir/x.bin`)

use glob::{MatchOptions, Pattern, PatternError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled include/exclude pattern lists
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PathFilter {
    /// Compile include and exclude patterns
    ///
    /// ```rust
    /// use bigfile_git::PathFilter;
    ///
    /// let filter = PathFilter::new(&["assets".to_string()], &["*.tmp".to_string()]).unwrap();
    /// assert!(filter.allows("assets/textures/rock.png"));
    /// assert!(!filter.allows("assets/cache/build.tmp"));
    /// assert!(!filter.allows("src/main.rs"));
    /// ```
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, PatternError> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// A filter that allows every path
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether `path` passes the filter
    ///
    /// An empty include list includes everything; any exclude match wins.
    pub fn allows(&self, path: &str) -> bool {
        let path = normalize(path);

        let included = self.include.is_empty() || self.include.iter().any(|p| matches(p, &path));
        included && !self.exclude.iter().any(|p| matches(p, &path))
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>, PatternError> {
    patterns
        .iter()
        .map(|p| normalize(p.as_ref()))
        .filter(|p| !p.is_empty())
        .map(|p| Pattern::new(&p))
        .collect()
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.strip_prefix("./").unwrap_or(&path);
    path.trim_end_matches('/').to_string()
}

fn matches(pattern: &Pattern, path: &str) -> bool {
    if pattern.matches_with(path, MATCH_OPTIONS) {
        return true;
    }

    // Leading directories
    let mut prefix_end = path.find('/');
    while let Some(end) = prefix_end {
        if pattern.matches_with(&path[..end], MATCH_OPTIONS) {
            return true;
        }
        prefix_end = path[end + 1..].find('/').map(|i| end + 1 + i);
    }

    if !pattern.as_str().contains('/') {
        if let Some(name) = path.rsplit('/').next() {
            return pattern.matches_with(name, MATCH_OPTIONS);
        }
    }
    false
}
