use std::{collections::HashMap, path::Path};

use crate::{
  error::Error,
  genscript::{self, ScriptEntry},
  package::{CodeItem, GeneratorCall, Package, TestcaseSubgroup},
  testcase::{destination_dir, destination_stem, TestcaseEntry},
};

/// Provenance of one built testcase (§3 GenerationEntry). Exactly one of
/// `copied_from` / `generator_call` is set; `generator_script_ref` is
/// additional provenance when the entry was produced by a script rather
/// than a direct `generators:` call.
#[derive(Debug, Clone, Default)]
pub struct GenerationMetadata {
  pub copied_to: std::path::PathBuf,
  pub copied_from: Option<std::path::PathBuf>,
  pub manual_output: Option<std::path::PathBuf>,
  pub generator_call: Option<GeneratorCall>,
  pub generator_script_ref: Option<(std::path::PathBuf, usize)>,
}

#[derive(Debug, Clone)]
pub struct GenerationEntry {
  pub entry: TestcaseEntry,
  pub subgroup_index: Option<usize>,
  pub subgroup_name: Option<String>,
  pub metadata: GenerationMetadata,
  pub validator: Option<CodeItem>,
  pub extra_validators: Vec<CodeItem>,
}

/// Scopes a traversal to a subset of the testgroup tree (§4.4). The default
/// implementation visits everything.
pub trait Visitor {
  fn should_visit_group(&mut self, _group: &str) -> bool {
    true
  }

  fn should_visit_subgroup(&mut self, _group: &str, _subgroup: Option<&str>) -> bool {
    true
  }

  fn should_visit_generator_scripts(&mut self, _group: &str) -> bool {
    true
  }
}

/// Visits every group/subgroup.
#[derive(Default)]
pub struct VisitAll;

impl Visitor for VisitAll {}

/// Scopes the traversal to groups/subgroups that intersect a testcase
/// pattern taken from the command line.
pub struct VisitPattern<'a>(pub &'a crate::testcase::TestcasePattern);

impl<'a> Visitor for VisitPattern<'a> {
  fn should_visit_group(&mut self, group: &str) -> bool {
    self.0.intersecting_group(group)
  }

  fn should_visit_subgroup(&mut self, group: &str, subgroup: Option<&str>) -> bool {
    let path = match subgroup {
      Some(name) => format!("{}/{}", group, name),
      None => group.to_string(),
    };
    self.0.intersecting_group(&path)
  }

  fn should_visit_generator_scripts(&mut self, group: &str) -> bool {
    self.0.intersecting_group(group)
  }
}

pub(crate) fn dedup_by_path(items: Vec<CodeItem>) -> Vec<CodeItem> {
  let mut seen = std::collections::HashSet::new();
  items.into_iter().filter(|c| seen.insert(c.path.clone())).collect()
}

/// Expand glob-pattern `CodeItem`s against the package root, in sorted
/// match order (§4.4). A `CodeItem` whose path contains no glob
/// metacharacter passes through unchanged.
pub(crate) fn expand_codeitem_globs(root: &Path, items: &[CodeItem]) -> Result<Vec<CodeItem>, Error> {
  let mut out = Vec::new();
  for item in items {
    let pattern = item.path.to_string_lossy();
    if !pattern.contains(['*', '?', '[']) {
      out.push(item.clone());
      continue;
    }
    let mut matches: Vec<_> = glob::glob(&root.join(pattern.as_ref()).to_string_lossy())
      .map_err(|e| Error::Package(format!("invalid glob `{}`: {}", pattern, e)))?
      .filter_map(Result::ok)
      .collect();
    matches.sort();
    for path in matches {
      out.push(CodeItem {
        path,
        language: item.language.clone(),
        compilation_files: item.compilation_files.clone(),
        compilation_fingerprint: None,
      });
    }
  }
  Ok(out)
}

/// Depth-first traversal of `package.testcases` (§4.4). `script_texts` must
/// already hold, for every generator-script `CodeItem` reachable in scope,
/// the resolved `rbx`/`box` source text (for a `.txt` script, its raw
/// contents; for any other extension, the stdout produced by compiling and
/// running it) — the Materializer resolves these ahead of the traversal
/// since doing so is itself a sandboxed operation.
pub fn walk(
  package: &Package,
  root: &Path,
  visitor: &mut dyn Visitor,
  script_texts: &HashMap<std::path::PathBuf, String>,
) -> Result<Vec<GenerationEntry>, Error> {
  let mut out = Vec::new();

  for group in &package.testcases {
    let group_name = group.name().as_str();
    if !visitor.should_visit_group(group_name) {
      continue;
    }

    let slots: Vec<(Option<usize>, Option<&str>, &TestcaseSubgroup)> = if group.subgroups.is_empty() {
      vec![(None, None, &group.base)]
    } else {
      group
        .subgroups
        .iter()
        .enumerate()
        .map(|(i, sub)| (Some(i + 1), Some(sub.name.as_str()), sub))
        .collect()
    };

    for (subgroup_index, subgroup_name, sub) in slots {
      if !visitor.should_visit_subgroup(group_name, subgroup_name) {
        continue;
      }

      let effective_validator = group.validator.clone().or_else(|| package.validator.clone());

      let mut extras = expand_codeitem_globs(root, &group.base.extra_validators)?;
      if subgroup_index.is_some() {
        extras.extend(expand_codeitem_globs(root, &sub.extra_validators)?);
      }
      let extras = dedup_by_path(extras);

      let dest_dir = destination_dir(root, group_name);
      let mut index = 0usize;

      let mut push_entry = |meta: GenerationMetadata| {
        let stem = destination_stem(subgroup_index, subgroup_name, index);
        let mut meta = meta;
        meta.copied_to = dest_dir.join(stem);
        out.push(GenerationEntry {
          entry: TestcaseEntry::new(group_name, index),
          subgroup_index,
          subgroup_name: subgroup_name.map(str::to_string),
          metadata: meta,
          validator: effective_validator.clone(),
          extra_validators: extras.clone(),
        });
        index += 1;
      };

      for tc in &sub.testcases {
        push_entry(GenerationMetadata {
          copied_from: Some(tc.input_path.clone()),
          manual_output: tc.output_path.clone(),
          ..Default::default()
        });
      }

      if let Some(pattern) = &sub.testcase_glob {
        let mut matches: Vec<_> = glob::glob(&root.join(pattern).to_string_lossy())
          .map_err(|e| Error::Package(format!("invalid glob `{}`: {}", pattern, e)))?
          .filter_map(Result::ok)
          .collect();
        matches.sort();
        for path in matches {
          push_entry(GenerationMetadata {
            copied_from: Some(path),
            ..Default::default()
          });
        }
      }

      for call in &sub.generators {
        push_entry(GenerationMetadata {
          generator_call: Some(call.clone()),
          ..Default::default()
        });
      }

      if let Some(script) = &sub.generator_script {
        if visitor.should_visit_generator_scripts(group_name) {
          let text = script_texts.get(&script.path).ok_or_else(|| {
            Error::Package(format!("generator script `{}` was not resolved", script.path.display()))
          })?;
          let entries: Vec<ScriptEntry> = genscript::parse(sub.generator_script_format, text)?;
          for e in entries {
            match (&e.generator_name, &e.copied_from) {
              (Some(name), None) => push_entry(GenerationMetadata {
                generator_call: Some(GeneratorCall {
                  name: name.clone(),
                  args: Some(e.args.clone()).filter(|s| !s.is_empty()),
                }),
                generator_script_ref: Some((script.path.clone(), e.source_line)),
                ..Default::default()
              }),
              (None, Some(path)) => push_entry(GenerationMetadata {
                copied_from: Some(path.clone()),
                generator_script_ref: Some((script.path.clone(), e.source_line)),
                ..Default::default()
              }),
              _ => {
                return Err(Error::GenScript(format!(
                  "line {}: malformed script entry",
                  e.source_line
                )))
              }
            }
          }
        }
      }
    }
  }

  Ok(out)
}
