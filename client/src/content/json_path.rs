// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Small JSON path evaluator for diagnostic extraction.
//!
//! Supports dotted names, `[n]` array indexing, and `"quoted"` names:
//! `AddressInfo[1].City."Name"`. Standard scans use direct property lookup;
//! this exists for poking at payloads.

use serde_json::Value;

/// Split a path into segments. Quoted names and bracket indices are kept as
/// single segments including their delimiters.
pub fn parse_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut previous = '\0';

    for c in path.chars() {
        match c {
            '"' if previous != '\\' => {
                if in_quotes {
                    current.push(c);
                    segments.push(std::mem::take(&mut current));
                } else {
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                    current.push(c);
                }
                in_quotes = !in_quotes;
            }
            '[' if !in_quotes => {
                in_brackets = true;
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                current.push(c);
            }
            ']' if !in_quotes => {
                in_brackets = false;
                current.push(c);
                segments.push(std::mem::take(&mut current));
            }
            '.' if !in_quotes && !in_brackets => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
        previous = c;
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Walk a path from `root`. `None` on any mismatch.
pub fn evaluate<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in parse_path(path) {
        if segment.is_empty() {
            continue;
        }

        if segment.starts_with('[') && segment.ends_with(']') {
            let index: usize = segment[1..segment.len() - 1].parse().ok()?;
            current = current.as_array()?.get(index)?;
        } else if segment.starts_with('"') && segment.ends_with('"') && segment.len() >= 2 {
            current = current.as_object()?.get(&segment[1..segment.len() - 1])?;
        } else {
            current = current.as_object()?.get(&segment)?;
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_dots_brackets_and_quotes() {
        assert_eq!(
            parse_path(r#"AddressInfo[1].City."Name""#),
            vec!["AddressInfo", "[1]", "City", "\"Name\""]
        );
    }

    #[test]
    fn evaluates_nested_paths() {
        let doc = json!({
            "AddressInfo": [
                {"City": {"Name": "Boise"}},
                {"City": {"Name": "San Francisco"}}
            ]
        });
        assert_eq!(
            evaluate(&doc, "AddressInfo[1].City.Name"),
            Some(&json!("San Francisco"))
        );
        assert_eq!(
            evaluate(&doc, r#"AddressInfo[0].City."Name""#),
            Some(&json!("Boise"))
        );
    }

    #[test]
    fn mismatches_yield_none() {
        let doc = json!({"a": [1, 2]});
        assert_eq!(evaluate(&doc, "a[5]"), None);
        assert_eq!(evaluate(&doc, "b"), None);
        assert_eq!(evaluate(&doc, "a.b"), None);
    }
}
