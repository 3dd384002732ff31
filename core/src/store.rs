//! On-disk document store for the five source documents and the build
//! artifacts derived from them.
//!
//! Layout under the store root:
//!
//! ```text
//! specs/3gpp_base_atspec.v0.json        baseline spec (normative)
//! profiles/generic_3gpp.profile.v0.json transport profile
//! models/3gpp_base.efsm.json            EFSM template
//! manifests/default.manifest.json       test-scope manifest
//! extensions/vendor.extension.json      vendor extension
//! build/effective_atspec.json           compile outputs
//! build/effective_profile.json
//! build/active_efsm.json
//! build/compile_report.json
//! ```
//!
//! Loads are tolerant: a missing or unparseable file reads as an empty
//! object so downstream passes degrade instead of failing. Writes are
//! pretty-printed UTF-8.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;
use serde_json::json;
use tracing::warn;

use crate::defaults;
use crate::error::AtForgeError;
use crate::error::Result;
use crate::merge::merge_spec;

/// How a baseline save was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// File replaced wholesale.
    Replaced,
    /// Baseline was locked; incoming data merged additively on top of the
    /// existing document, canonical `meta.id` preserved.
    MergeLocked,
}

impl SaveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::MergeLocked => "merge_locked",
        }
    }
}

/// Handle on a store root. Cheap to clone; no state beyond the path.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── paths ───────────────────────────────────────────────────────────────

    pub fn spec_path(&self) -> PathBuf {
        self.root.join("specs").join("3gpp_base_atspec.v0.json")
    }

    pub fn profile_path(&self) -> PathBuf {
        self.root.join("profiles").join("generic_3gpp.profile.v0.json")
    }

    pub fn efsm_path(&self) -> PathBuf {
        self.root.join("models").join("3gpp_base.efsm.json")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifests").join("default.manifest.json")
    }

    pub fn extension_path(&self) -> PathBuf {
        self.root.join("extensions").join("vendor.extension.json")
    }

    pub fn effective_spec_path(&self) -> PathBuf {
        self.root.join("build").join("effective_atspec.json")
    }

    pub fn effective_profile_path(&self) -> PathBuf {
        self.root.join("build").join("effective_profile.json")
    }

    pub fn active_efsm_path(&self) -> PathBuf {
        self.root.join("build").join("active_efsm.json")
    }

    pub fn compile_report_path(&self) -> PathBuf {
        self.root.join("build").join("compile_report.json")
    }

    // ── seeding ─────────────────────────────────────────────────────────────

    /// Create the directory tree and seed any missing source document with
    /// its built-in default. Existing files are never touched.
    pub fn ensure_assets(&self) -> Result<()> {
        let seeds = [
            (self.spec_path(), defaults::baseline_spec()),
            (self.profile_path(), defaults::transport_profile()),
            (self.efsm_path(), defaults::efsm_template()),
            (self.manifest_path(), defaults::manifest()),
            (self.extension_path(), defaults::vendor_extension()),
        ];
        for (path, doc) in &seeds {
            self.create_parent(path)?;
            if !path.exists() {
                self.write_pretty(path, doc)?;
            }
        }
        let build = self.root.join("build");
        fs::create_dir_all(&build).map_err(|source| AtForgeError::DirCreate {
            path: build.clone(),
            source,
        })?;
        Ok(())
    }

    // ── loads ───────────────────────────────────────────────────────────────

    pub fn load_spec(&self) -> Value {
        self.load_json(&self.spec_path())
    }

    pub fn load_profile(&self) -> Value {
        self.load_json(&self.profile_path())
    }

    pub fn load_efsm(&self) -> Value {
        self.load_json(&self.efsm_path())
    }

    pub fn load_manifest(&self) -> Value {
        self.load_json(&self.manifest_path())
    }

    pub fn load_extension(&self) -> Value {
        self.load_json(&self.extension_path())
    }

    /// All four build artifacts, keyed the way `show build` prints them.
    pub fn load_build(&self) -> Value {
        json!({
            "effective_atspec": self.load_json(&self.effective_spec_path()),
            "effective_profile": self.load_json(&self.effective_profile_path()),
            "active_efsm": self.load_json(&self.active_efsm_path()),
            "report": self.load_json(&self.compile_report_path()),
        })
    }

    /// Compiled spec if present and non-empty, else the raw baseline.
    pub fn runtime_spec(&self) -> Value {
        self.load_with_fallback(&self.effective_spec_path(), &self.spec_path())
    }

    pub fn runtime_profile(&self) -> Value {
        self.load_with_fallback(&self.effective_profile_path(), &self.profile_path())
    }

    pub fn runtime_efsm(&self) -> Value {
        self.load_with_fallback(&self.active_efsm_path(), &self.efsm_path())
    }

    // ── saves ───────────────────────────────────────────────────────────────

    /// Save the baseline spec. With `locked_baseline`, an existing document
    /// is never replaced: the incoming data merges additively on top and the
    /// canonical `meta.id` survives.
    pub fn save_spec(&self, data: &Value, locked_baseline: bool) -> Result<SaveMode> {
        let path = self.spec_path();
        self.create_parent(&path)?;
        if locked_baseline {
            let existing = self.load_spec();
            if existing.as_object().is_some_and(|map| !map.is_empty()) {
                let mut merged = merge_spec(&existing, data);
                if let Some(id) = existing
                    .get("meta")
                    .filter(|meta| meta.as_object().is_some_and(|map| !map.is_empty()))
                    .and_then(|meta| meta.get("id"))
                    .filter(|id| !id.is_null())
                {
                    let meta = merged
                        .as_object_mut()
                        .map(|map| map.entry("meta").or_insert_with(|| json!({})));
                    if let Some(meta) = meta.and_then(Value::as_object_mut) {
                        meta.insert("id".to_string(), id.clone());
                    }
                }
                self.write_pretty(&path, &merged)?;
                return Ok(SaveMode::MergeLocked);
            }
        }
        self.write_pretty(&path, data)?;
        Ok(SaveMode::Replaced)
    }

    pub fn save_profile(&self, data: &Value) -> Result<()> {
        self.save_doc(&self.profile_path(), data)
    }

    pub fn save_efsm(&self, data: &Value) -> Result<()> {
        self.save_doc(&self.efsm_path(), data)
    }

    pub fn save_manifest(&self, data: &Value) -> Result<()> {
        self.save_doc(&self.manifest_path(), data)
    }

    pub fn save_extension(&self, data: &Value) -> Result<()> {
        self.save_doc(&self.extension_path(), data)
    }

    /// Persist the four compile outputs.
    pub fn save_build(
        &self,
        effective_spec: &Value,
        effective_profile: &Value,
        active_efsm: &Value,
        report: &Value,
    ) -> Result<()> {
        self.save_doc(&self.effective_spec_path(), effective_spec)?;
        self.save_doc(&self.effective_profile_path(), effective_profile)?;
        self.save_doc(&self.active_efsm_path(), active_efsm)?;
        self.save_doc(&self.compile_report_path(), report)?;
        Ok(())
    }

    /// Restore the user-mutated config layers (manifest + extension) to
    /// their defaults. The normative baseline, profile, and EFSM template
    /// are left as-is.
    pub fn reset_config_layers(&self) -> Result<()> {
        self.save_manifest(&defaults::manifest())?;
        self.save_extension(&defaults::vendor_extension())?;
        Ok(())
    }

    // ── helpers ─────────────────────────────────────────────────────────────

    fn load_json(&self, path: &Path) -> Value {
        if !path.exists() {
            return json!({});
        }
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!("unreadable document {}: {err}", path.display());
                return json!({});
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                warn!("malformed JSON in {}: {err}", path.display());
                json!({})
            }
        }
    }

    fn load_with_fallback(&self, primary: &Path, fallback: &Path) -> Value {
        let value = self.load_json(primary);
        if value.as_object().is_some_and(|map| !map.is_empty()) {
            value
        } else {
            self.load_json(fallback)
        }
    }

    fn save_doc(&self, path: &Path, data: &Value) -> Result<()> {
        self.create_parent(path)?;
        self.write_pretty(path, data)
    }

    fn create_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| AtForgeError::DirCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    fn write_pretty(&self, path: &Path, doc: &Value) -> Result<()> {
        let mut text =
            serde_json::to_string_pretty(doc).map_err(|source| AtForgeError::Serialize {
                what: path.display().to_string(),
                source,
            })?;
        text.push('\n');
        fs::write(path, text).map_err(|source| AtForgeError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, DocumentStore) {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path().join("at_agent"));
        (dir, store)
    }

    #[test]
    fn ensure_assets_seeds_missing_files_once() {
        let (_dir, store) = store();
        store.ensure_assets().unwrap();
        assert!(store.spec_path().exists());
        assert!(store.manifest_path().exists());

        // A user edit must survive a second ensure pass.
        store.save_manifest(&json!({"baseline": "custom"})).unwrap();
        store.ensure_assets().unwrap();
        assert_eq!(store.load_manifest(), json!({"baseline": "custom"}));
    }

    #[test]
    fn load_is_tolerant_of_missing_and_malformed_files() {
        let (_dir, store) = store();
        assert_eq!(store.load_spec(), json!({}));

        store.ensure_assets().unwrap();
        fs::write(store.manifest_path(), "{not json").unwrap();
        assert_eq!(store.load_manifest(), json!({}));
    }

    #[test]
    fn locked_save_merges_and_keeps_canonical_id() {
        let (_dir, store) = store();
        store.ensure_assets().unwrap();

        let incoming = json!({
            "meta": {"id": "vendor.rewrite", "version": "9.9"},
            "commands": [{"id": "cmd.new", "at": "AT+NEW"}],
        });
        let mode = store.save_spec(&incoming, true).unwrap();
        assert_eq!(mode, SaveMode::MergeLocked);

        let saved = store.load_spec();
        // Existing meta survives wholesale; the incoming rewrite is dropped.
        assert_eq!(saved["meta"]["id"], json!("3gpp.base"));
        assert_eq!(saved["meta"]["version"], json!("0.1.0"));
        let ids: Vec<&str> = saved["commands"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["id"].as_str())
            .collect();
        assert!(ids.contains(&"cmd.new"));
        assert!(ids.contains(&"cmd.creg"));
    }

    #[test]
    fn locked_save_over_empty_store_replaces() {
        let (_dir, store) = store();
        let mode = store
            .save_spec(&json!({"meta": {"id": "fresh"}}), true)
            .unwrap();
        assert_eq!(mode, SaveMode::Replaced);
        assert_eq!(store.load_spec()["meta"]["id"], json!("fresh"));
    }

    #[test]
    fn reset_restores_config_layers_only() {
        let (_dir, store) = store();
        store.ensure_assets().unwrap();
        store.save_manifest(&json!({"baseline": "mutated"})).unwrap();
        store.save_profile(&json!({"meta": {"id": "mutated"}})).unwrap();

        store.reset_config_layers().unwrap();
        assert_eq!(store.load_manifest()["baseline"], json!("atspec.3gpp@0.2"));
        assert_eq!(store.load_profile()["meta"]["id"], json!("mutated"));
    }

    #[test]
    fn runtime_documents_fall_back_to_base_files() {
        let (_dir, store) = store();
        store.ensure_assets().unwrap();
        // No build artifacts yet: runtime loads resolve to the base files.
        assert_eq!(store.runtime_spec()["meta"]["id"], json!("3gpp.base"));

        store
            .save_build(
                &json!({"meta": {"id": "compiled"}}),
                &json!({}),
                &json!({}),
                &json!({}),
            )
            .unwrap();
        assert_eq!(store.runtime_spec()["meta"]["id"], json!("compiled"));
        // Empty effective profile still falls back.
        assert_eq!(
            store.runtime_profile()["meta"]["id"],
            json!("profile.generic_3gpp")
        );
    }
}
