//! Runs the fixture cases under `fixtures/` against the request pipeline.
//!
//! Each `*.cases.json` names a declaration document and a list of payloads
//! with the issues (`"<pointer> <code>"`) and, optionally, the params they
//! should produce. An optional first argument is a regex over case names.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use api_shapes::decl::Document;
use api_shapes::{RequestPipeline, Scope};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseFile {
    decl: PathBuf,
    cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    scope: Option<String>,
    payload: Value,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    params: Option<Value>,
}

fn read_with_path<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let src = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let de = &mut serde_json::Deserializer::from_str(&src);
    serde_path_to_error::deserialize::<_, T>(de)
        .map_err(|err| format!("{}: at JSON path {} → {}", path.display(), err.path(), err.inner()))
}

fn run_file(path: &Path, filter: Option<&Regex>) -> Result<(usize, usize), String> {
    let file: CaseFile = read_with_path(path)?;
    let decl_path = path.parent().unwrap_or(Path::new(".")).join(&file.decl);
    let decl_src = std::fs::read_to_string(&decl_path).map_err(|e| format!("{}: {e}", decl_path.display()))?;
    let loaded = Document::parse(&decl_src)
        .and_then(Document::load)
        .map_err(|e| format!("{}: {e}", decl_path.display()))?;
    let pipeline = RequestPipeline::new(&loaded.registry);

    let (mut passed, mut failed) = (0, 0);
    for case in &file.cases {
        if filter.is_some_and(|re| !re.is_match(&case.name)) {
            continue;
        }
        let scope = case.scope.as_deref().map(Scope::owner).unwrap_or_default();
        let Some(result) = pipeline.process_type(&case.payload, &case.type_name, &scope) else {
            eprintln!("❌ {}: type `{}` does not resolve", case.name, case.type_name);
            failed += 1;
            continue;
        };
        let issues: Vec<String> = result
            .issues
            .iter()
            .map(|i| format!("{} {}", i.pointer(), i.code()))
            .collect();
        let params_ok = case.params.as_ref().is_none_or(|expected| expected == &result.params);
        if issues == case.issues && params_ok {
            eprintln!("✅ {}", case.name);
            passed += 1;
        } else {
            eprintln!("❌ {}", case.name);
            eprintln!("   issues: {issues:?} (expected {:?})", case.issues);
            if !params_ok {
                eprintln!("   params: {}", result.params);
            }
            failed += 1;
        }
    }
    Ok((passed, failed))
}

fn main() -> ExitCode {
    let filter = match std::env::args().nth(1).map(|p| Regex::new(&p)).transpose() {
        Ok(filter) => filter,
        Err(error) => {
            eprintln!("bad filter: {error}");
            return ExitCode::FAILURE;
        }
    };
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let mut paths: Vec<PathBuf> = match std::fs::read_dir(&fixtures) {
        Ok(entries) => entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.to_string_lossy().ends_with(".cases.json"))
            .collect(),
        Err(error) => {
            eprintln!("{}: {error}", fixtures.display());
            return ExitCode::FAILURE;
        }
    };
    paths.sort();

    let (mut passed, mut failed) = (0, 0);
    for path in &paths {
        match run_file(path, filter.as_ref()) {
            Ok((p, f)) => {
                passed += p;
                failed += f;
            }
            Err(error) => {
                eprintln!("❌ {error}");
                failed += 1;
            }
        }
    }
    eprintln!("—— {passed} passed, {failed} failed ——");
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
