//! Topic names and topic patterns
//!
//! Topics are `/`-separated levels. A pattern may use two wildcards:
//! - `*` as a whole level matches exactly one level; as the last character of
//!   a level (`ab*`) it matches any single level starting with the prefix
//! - `>` as the final whole level matches one or more remaining levels

use std::fmt;

use crate::utils::error::PatternError;

const LEVEL_SEPARATOR: char = '/';
const ONE_LEVEL: char = '*';
const MANY_LEVELS: char = '>';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Level {
    Literal(String),
    Prefix(String),
    Any,
    Rest,
}

/// A validated subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    levels: Vec<Level>,
}

impl TopicPattern {
    /// Parses and validates a pattern.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        let parts: Vec<&str> = pattern.split(LEVEL_SEPARATOR).collect();
        let last = parts.len() - 1;
        let mut levels = Vec::with_capacity(parts.len());

        for (index, part) in parts.iter().enumerate() {
            if part.is_empty() {
                return Err(PatternError::EmptyLevel { index });
            }

            if *part == ">" {
                if index != last {
                    return Err(PatternError::MisplacedWildcard {
                        wildcard: MANY_LEVELS,
                        index,
                    });
                }
                levels.push(Level::Rest);
                continue;
            }
            if part.contains(MANY_LEVELS) {
                return Err(PatternError::MisplacedWildcard {
                    wildcard: MANY_LEVELS,
                    index,
                });
            }

            match part.find(ONE_LEVEL) {
                None => levels.push(Level::Literal(part.to_string())),
                Some(pos) if pos == part.len() - 1 => {
                    if pos == 0 {
                        levels.push(Level::Any);
                    } else {
                        levels.push(Level::Prefix(part[..pos].to_string()));
                    }
                }
                Some(_) => {
                    return Err(PatternError::MisplacedWildcard {
                        wildcard: ONE_LEVEL,
                        index,
                    });
                }
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            levels,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern contains no wildcard.
    pub fn is_exact(&self) -> bool {
        self.levels.iter().all(|l| matches!(l, Level::Literal(_)))
    }

    /// Returns whether `topic` is matched by this pattern.
    pub fn matches(&self, topic: &str) -> bool {
        if self.is_exact() {
            return self.raw == topic;
        }

        let mut remaining = topic.split(LEVEL_SEPARATOR);
        for level in &self.levels {
            let Some(part) = remaining.next() else {
                return false;
            };
            let hit = match level {
                Level::Literal(lit) => lit == part,
                Level::Prefix(prefix) => part.starts_with(prefix.as_str()),
                Level::Any => !part.is_empty(),
                // `>` is always last and needs at least one level
                Level::Rest => return !part.is_empty(),
            };
            if !hit {
                return false;
            }
        }
        remaining.next().is_none()
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Validates a topic used for publishing: same level rules as a pattern, no wildcards.
pub fn validate_topic(topic: &str) -> Result<(), PatternError> {
    let pattern = TopicPattern::parse(topic)?;
    if pattern.is_exact() {
        Ok(())
    } else {
        Err(PatternError::WildcardInTopic)
    }
}
