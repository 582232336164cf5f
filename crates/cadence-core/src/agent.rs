//! Agent descriptors and the registry that owns them.
//!
//! Descriptors are inert data loaded from YAML files under
//! `.cadence/agents/`; they carry no executable logic. Executable behavior
//! is uniform across agents and selected by descriptor fields.

use crate::error::{CadenceError, Result};
use crate::io;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// AgentDescriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Kebab-case identity, unique within the registry.
    pub name: String,
    pub display_name: String,
    pub color: String,
    pub emoji: String,
    pub short_label: String,
    /// Exclusive language domain, e.g. "python". None for cross-cutting agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    /// Regexes over file paths the agent may touch.
    #[serde(default)]
    pub file_patterns: Vec<String>,
    #[serde(default)]
    pub skill_keywords: Vec<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Shell line that authors or scaffolds tests ahead of the first run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaffold_command: Option<String>,
    /// Shell line that authors the implementation between test runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implement_command: Option<String>,
    /// Shell line run to execute the test suite inside a worktree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    /// Shell line whose stdout reports coverage as a percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint_command: Option<String>,
}

impl AgentDescriptor {
    fn sidecar_markdown(&self) -> String {
        let mut body = format!(
            "---\nname: {}\ndescription: {} {}\n---\n\n# {} {}\n\n",
            self.name, self.short_label, self.display_name, self.emoji, self.display_name
        );
        if let Some(language) = &self.language {
            body.push_str(&format!("Language: {language}\n\n"));
        }
        if !self.frameworks.is_empty() {
            body.push_str(&format!("Frameworks: {}\n\n", self.frameworks.join(", ")));
        }
        if !self.allowed_tools.is_empty() {
            body.push_str(&format!("Tools: {}\n", self.allowed_tools.join(", ")));
        }
        body
    }
}

// ---------------------------------------------------------------------------
// Built-in descriptors
// ---------------------------------------------------------------------------

struct BuiltinSpec {
    name: &'static str,
    display_name: &'static str,
    color: &'static str,
    emoji: &'static str,
    short_label: &'static str,
    language: Option<&'static str>,
    frameworks: &'static [&'static str],
    file_patterns: &'static [&'static str],
    skill_keywords: &'static [&'static str],
    test_command: Option<&'static str>,
    coverage_command: Option<&'static str>,
}

const BUILTINS: &[BuiltinSpec] = &[
    BuiltinSpec {
        name: "project-manager",
        display_name: "Project Manager",
        color: "magenta",
        emoji: "📋",
        short_label: "PM",
        language: None,
        frameworks: &["scrum", "kanban"],
        file_patterns: &[r".*\.md$", r".*\.json$", r".*\.yaml$"],
        skill_keywords: &["planning", "estimation", "refactor", "review"],
        test_command: None,
        coverage_command: None,
    },
    BuiltinSpec {
        name: "context-manager",
        display_name: "Context Manager",
        color: "blue",
        emoji: "🔍",
        short_label: "CTX",
        language: None,
        frameworks: &[],
        file_patterns: &[r".*"],
        skill_keywords: &["analysis", "context", "search"],
        test_command: None,
        coverage_command: None,
    },
    BuiltinSpec {
        name: "python-engineer",
        display_name: "Python Engineer",
        color: "green",
        emoji: "🐍",
        short_label: "PY",
        language: Some("python"),
        frameworks: &["django", "flask", "fastapi"],
        file_patterns: &[r".*\.py$", r"requirements\.txt$", r"pyproject\.toml$"],
        skill_keywords: &["python", "django", "flask", "fastapi"],
        test_command: Some("pytest"),
        coverage_command: Some("pytest --cov"),
    },
    BuiltinSpec {
        name: "golang-engineer",
        display_name: "Go Engineer",
        color: "cyan",
        emoji: "🐹",
        short_label: "GO",
        language: Some("go"),
        frameworks: &["gin"],
        file_patterns: &[r".*\.go$", r"go\.mod$"],
        skill_keywords: &["go", "golang", "gin"],
        test_command: Some("go test ./..."),
        coverage_command: Some("go test -cover ./..."),
    },
    BuiltinSpec {
        name: "frontend-engineer",
        display_name: "Frontend Engineer",
        color: "yellow",
        emoji: "🎨",
        short_label: "FE",
        language: Some("typescript"),
        frameworks: &["react", "vue", "angular"],
        file_patterns: &[r".*\.tsx?$", r".*\.jsx?$", r"package\.json$"],
        skill_keywords: &["typescript", "javascript", "react", "vue", "angular"],
        test_command: Some("npx jest"),
        coverage_command: Some("npx jest --coverage"),
    },
    BuiltinSpec {
        name: "test-runner",
        display_name: "Test Runner",
        color: "red",
        emoji: "🧪",
        short_label: "TEST",
        language: None,
        frameworks: &["pytest", "jest"],
        file_patterns: &[r".*test.*", r".*spec.*"],
        skill_keywords: &["test", "coverage", "e2e"],
        test_command: None,
        coverage_command: None,
    },
    BuiltinSpec {
        name: "devops-engineer",
        display_name: "DevOps Engineer",
        color: "bright-blue",
        emoji: "🚢",
        short_label: "OPS",
        language: None,
        frameworks: &["docker", "kubernetes", "terraform"],
        file_patterns: &[r"Dockerfile$", r".*\.tf$", r".*\.ya?ml$"],
        skill_keywords: &["docker", "kubernetes", "terraform", "deploy", "pipeline"],
        test_command: None,
        coverage_command: None,
    },
    BuiltinSpec {
        name: "database-engineer",
        display_name: "Database Engineer",
        color: "bright-magenta",
        emoji: "🗄️",
        short_label: "DB",
        language: Some("sql"),
        frameworks: &["postgres", "mongodb"],
        file_patterns: &[r".*\.sql$"],
        skill_keywords: &["sql", "postgres", "mongo", "migration"],
        test_command: None,
        coverage_command: None,
    },
    BuiltinSpec {
        name: "java-engineer",
        display_name: "Java Engineer",
        color: "bright-red",
        emoji: "☕",
        short_label: "JAVA",
        language: Some("java"),
        frameworks: &["spring"],
        file_patterns: &[r".*\.java$", r"pom\.xml$", r"build\.gradle$"],
        skill_keywords: &["java", "spring"],
        test_command: Some("mvn test"),
        coverage_command: Some("mvn verify"),
    },
    BuiltinSpec {
        name: "ruby-engineer",
        display_name: "Ruby Engineer",
        color: "bright-red",
        emoji: "💎",
        short_label: "RB",
        language: Some("ruby"),
        frameworks: &["rails"],
        file_patterns: &[r".*\.rb$", r"Gemfile$", r".*\.erb$"],
        skill_keywords: &["ruby", "rails", "rspec"],
        test_command: Some("bundle exec rspec"),
        coverage_command: Some("bundle exec rspec"),
    },
    BuiltinSpec {
        name: "rust-engineer",
        display_name: "Rust Engineer",
        color: "bright-yellow",
        emoji: "🦀",
        short_label: "RS",
        language: Some("rust"),
        frameworks: &["actix"],
        file_patterns: &[r".*\.rs$", r"Cargo\.toml$"],
        skill_keywords: &["rust", "cargo"],
        test_command: Some("cargo test"),
        coverage_command: Some("cargo tarpaulin"),
    },
    BuiltinSpec {
        name: "swift-engineer",
        display_name: "Swift Engineer",
        color: "bright-white",
        emoji: "🕊️",
        short_label: "SW",
        language: Some("swift"),
        frameworks: &["swiftui"],
        file_patterns: &[r".*\.swift$"],
        skill_keywords: &["swift", "ios"],
        test_command: Some("swift test"),
        coverage_command: None,
    },
    BuiltinSpec {
        name: "kotlin-engineer",
        display_name: "Kotlin Engineer",
        color: "bright-cyan",
        emoji: "🤖",
        short_label: "KT",
        language: Some("kotlin"),
        frameworks: &["android"],
        file_patterns: &[r".*\.kt$"],
        skill_keywords: &["kotlin", "android"],
        test_command: Some("gradle test"),
        coverage_command: None,
    },
    BuiltinSpec {
        name: "elixir-engineer",
        display_name: "Elixir Engineer",
        color: "magenta",
        emoji: "💧",
        short_label: "EX",
        language: Some("elixir"),
        frameworks: &["phoenix"],
        file_patterns: &[r".*\.exs?$", r"mix\.exs$"],
        skill_keywords: &["elixir", "phoenix"],
        test_command: Some("mix test"),
        coverage_command: Some("mix test --cover"),
    },
    BuiltinSpec {
        name: "haskell-engineer",
        display_name: "Haskell Engineer",
        color: "bright-magenta",
        emoji: "λ",
        short_label: "HS",
        language: Some("haskell"),
        frameworks: &[],
        file_patterns: &[r".*\.hs$", r".*\.cabal$"],
        skill_keywords: &["haskell", "cabal"],
        test_command: Some("cabal test"),
        coverage_command: None,
    },
    BuiltinSpec {
        name: "r-engineer",
        display_name: "R Engineer",
        color: "blue",
        emoji: "📊",
        short_label: "R",
        language: Some("r"),
        frameworks: &["ggplot"],
        file_patterns: &[r".*\.[rR]$"],
        skill_keywords: &["r", "ggplot"],
        test_command: Some("Rscript -e testthat::test_dir('tests')"),
        coverage_command: None,
    },
    BuiltinSpec {
        name: "engineer",
        display_name: "Engineer",
        color: "white",
        emoji: "🔧",
        short_label: "ENG",
        language: None,
        frameworks: &[],
        file_patterns: &[r".*"],
        skill_keywords: &[],
        test_command: None,
        coverage_command: None,
    },
];

fn descriptor_from(spec: &BuiltinSpec) -> AgentDescriptor {
    AgentDescriptor {
        name: spec.name.to_string(),
        display_name: spec.display_name.to_string(),
        color: spec.color.to_string(),
        emoji: spec.emoji.to_string(),
        short_label: spec.short_label.to_string(),
        language: spec.language.map(str::to_string),
        frameworks: spec.frameworks.iter().map(|s| s.to_string()).collect(),
        file_patterns: spec.file_patterns.iter().map(|s| s.to_string()).collect(),
        skill_keywords: spec.skill_keywords.iter().map(|s| s.to_string()).collect(),
        allowed_tools: vec!["shell".to_string(), "git".to_string()],
        scaffold_command: None,
        implement_command: None,
        test_command: spec.test_command.map(str::to_string),
        coverage_command: spec.coverage_command.map(str::to_string),
        lint_command: None,
    }
}

/// The built-in descriptor set.
pub fn builtin_descriptors() -> Vec<AgentDescriptor> {
    BUILTINS.iter().map(descriptor_from).collect()
}

/// Template for materializing an agent for a technology the registry does
/// not cover yet. Creation is writing a file, not instantiating behavior.
pub fn descriptor_template(tech: &str) -> AgentDescriptor {
    let tech = tech.to_ascii_lowercase();
    let mut display = String::new();
    for (i, c) in tech.chars().enumerate() {
        if i == 0 {
            display.extend(c.to_uppercase());
        } else {
            display.push(c);
        }
    }
    AgentDescriptor {
        name: format!("{tech}-engineer"),
        display_name: format!("{display} Engineer"),
        color: "white".to_string(),
        emoji: "🔧".to_string(),
        short_label: tech.to_ascii_uppercase().chars().take(4).collect(),
        language: Some(tech.clone()),
        frameworks: Vec::new(),
        file_patterns: vec![r".*".to_string()],
        skill_keywords: vec![tech],
        allowed_tools: vec!["shell".to_string(), "git".to_string()],
        scaffold_command: None,
        implement_command: None,
        test_command: None,
        coverage_command: None,
        lint_command: None,
    }
}

// ---------------------------------------------------------------------------
// AgentRegistry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AgentRegistry {
    root: PathBuf,
    agents: BTreeMap<String, AgentDescriptor>,
}

impl AgentRegistry {
    /// Load the registry: built-in descriptors overlaid by descriptor files
    /// from `.cadence/agents/`. Two files defining the same agent name are
    /// refused.
    pub fn load(root: &Path) -> Result<Self> {
        let mut agents: BTreeMap<String, AgentDescriptor> = builtin_descriptors()
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        let dir = paths::agents_dir(root);
        if dir.exists() {
            let mut from_files: BTreeMap<String, PathBuf> = BTreeMap::new();
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
                .collect();
            entries.sort();
            for path in entries {
                let raw = std::fs::read_to_string(&path)?;
                let descriptor: AgentDescriptor = serde_yaml::from_str(&raw)?;
                paths::validate_name(&descriptor.name)?;
                if let Some(previous) = from_files.get(&descriptor.name) {
                    return Err(CadenceError::Conflict(format!(
                        "agent '{}' defined by both {} and {}",
                        descriptor.name,
                        previous.display(),
                        path.display()
                    )));
                }
                from_files.insert(descriptor.name.clone(), path);
                agents.insert(descriptor.name.clone(), descriptor);
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            agents,
        })
    }

    pub fn get(&self, name: &str) -> Option<&AgentDescriptor> {
        self.agents.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn list(&self) -> Vec<&AgentDescriptor> {
        self.agents.values().collect()
    }

    /// Register a new descriptor. With `persist`, writes the YAML descriptor
    /// plus a markdown sidecar for downstream tools.
    pub fn create(&mut self, descriptor: AgentDescriptor, persist: bool) -> Result<&AgentDescriptor> {
        paths::validate_name(&descriptor.name)?;
        if self.agents.contains_key(&descriptor.name) {
            return Err(CadenceError::Conflict(format!(
                "agent '{}' already exists",
                descriptor.name
            )));
        }
        if persist {
            self.persist_descriptor(&descriptor)?;
        }
        let name = descriptor.name.clone();
        self.agents.insert(name.clone(), descriptor);
        Ok(&self.agents[&name])
    }

    /// Write descriptor files for every built-in that has none yet. Used by
    /// project initialization so agents are visible on disk.
    pub fn persist_builtins(&self) -> Result<()> {
        for descriptor in builtin_descriptors() {
            let path = paths::agent_descriptor(&self.root, &descriptor.name);
            if !path.exists() {
                self.persist_descriptor(&descriptor)?;
            }
        }
        Ok(())
    }

    fn persist_descriptor(&self, descriptor: &AgentDescriptor) -> Result<()> {
        let yaml = serde_yaml::to_string(descriptor)?;
        io::atomic_write(
            &paths::agent_descriptor(&self.root, &descriptor.name),
            yaml.as_bytes(),
        )?;
        io::atomic_write(
            &paths::agent_sidecar(&self.root, &descriptor.name),
            descriptor.sidecar_markdown().as_bytes(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
