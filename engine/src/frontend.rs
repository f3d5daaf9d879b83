// frontend.rs - What was asked of the optimizer
//
// A trace is produced either for an optimization level or for an explicit
// pass pipeline. Which of the two is legal depends on the frontend: only raw
// LLVM IR inputs go through a driver that accepts individual pass names.
//
// Pass pipelines are parsed with chumsky combinators over the pipeline text
// (`sroa,instcombine`, `function(loop-mssa(licm))`, `simplifycfg<no-sink>`).
//
// Preconditions: none.
// Postconditions: a validated `Invocation` pairs a frontend with a request it
//   can express.
// Failure modes: unknown file kinds, malformed pipelines, pass lists for
//   level-only frontends.
// Side effects: none.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chumsky::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// ── Frontend ───────────────────────────────────────────────────────────────

/// Source kind that determined how the trace was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frontend {
    /// Textual LLVM IR run through the standalone optimizer.
    LlvmIr,
    C,
    Cpp,
    Rust,
}

impl Frontend {
    /// Detect the frontend from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Result<Self, ParseError> {
        match ext {
            "ll" => Ok(Frontend::LlvmIr),
            "c" => Ok(Frontend::C),
            "cpp" | "cc" | "cxx" | "c++" => Ok(Frontend::Cpp),
            "rs" => Ok(Frontend::Rust),
            other => Err(ParseError::UnsupportedFileKind(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ParseError::UnsupportedFileKind(path.display().to_string()))?;
        Self::from_extension(ext)
    }

    /// Whether this frontend exposes individual pass names, or only
    /// optimization-level selection.
    pub fn accepts_pass_list(self) -> bool {
        matches!(self, Frontend::LlvmIr)
    }
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frontend::LlvmIr => "LLVM IR",
            Frontend::C => "C",
            Frontend::Cpp => "C++",
            Frontend::Rust => "Rust",
        };
        f.write_str(name)
    }
}

impl FromStr for Frontend {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llvm" | "llvm-ir" => Ok(Frontend::LlvmIr),
            "c++" => Ok(Frontend::Cpp),
            other => Self::from_extension(other),
        }
    }
}

// ── Optimization level ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptLevel {
    O0,
    O1,
    O2,
    O3,
    Os,
    Oz,
}

impl OptLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            OptLevel::O0 => "O0",
            OptLevel::O1 => "O1",
            OptLevel::O2 => "O2",
            OptLevel::O3 => "O3",
            OptLevel::Os => "Os",
            OptLevel::Oz => "Oz",
        }
    }
}

impl FromStr for OptLevel {
    type Err = ();

    /// Accepts `O2`, `-O2` and `default<O2>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("default<")
            .and_then(|rest| rest.strip_suffix('>'))
            .unwrap_or(s);
        let s = s.strip_prefix('-').unwrap_or(s);
        match s {
            "O0" => Ok(OptLevel::O0),
            "O1" => Ok(OptLevel::O1),
            "O2" => Ok(OptLevel::O2),
            "O3" => Ok(OptLevel::O3),
            "Os" => Ok(OptLevel::Os),
            "Oz" => Ok(OptLevel::Oz),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Pass pipeline ──────────────────────────────────────────────────────────

/// One element of a pass pipeline. Adaptors such as `function(...)` carry
/// their nested pipeline; leaf passes have none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSpec {
    pub name: String,
    pub nested: Vec<PassSpec>,
}

/// An explicit, ordered pass pipeline as given to the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassPipeline {
    pub text: String,
    pub passes: Vec<PassSpec>,
}

impl PassPipeline {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let passes = pipeline_parser()
            .parse(text)
            .into_result()
            .map_err(|errs| ParseError::InvalidPipeline {
                text: text.to_string(),
                message: errs
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            })?;
        Ok(PassPipeline {
            text: text.trim().to_string(),
            passes,
        })
    }

    /// Leaf pass names in execution order; adaptor wrappers are flattened.
    pub fn pass_names(&self) -> Vec<&str> {
        fn walk<'a>(specs: &'a [PassSpec], out: &mut Vec<&'a str>) {
            for spec in specs {
                if spec.nested.is_empty() {
                    out.push(&spec.name);
                } else {
                    walk(&spec.nested, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.passes, &mut out);
        out
    }
}

fn pipeline_parser<'src>() -> impl Parser<'src, &'src str, Vec<PassSpec>, extra::Err<Rich<'src, char>>>
{
    let pipeline = recursive(|pipeline| {
        let params = none_of("<>")
            .repeated()
            .delimited_by(just('<'), just('>'));

        let name = any()
            .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
            .repeated()
            .at_least(1)
            .then(params.or_not())
            .to_slice();

        name.then(pipeline.delimited_by(just('('), just(')')).or_not())
            .map(|(name, nested): (&str, Option<Vec<PassSpec>>)| PassSpec {
                name: name.to_string(),
                nested: nested.unwrap_or_default(),
            })
            .separated_by(just(',').padded())
            .at_least(1)
            .collect::<Vec<_>>()
    });

    pipeline.padded().then_ignore(end())
}

// ── Request ────────────────────────────────────────────────────────────────

/// What the trace was captured for. Levels and pass lists are mutually
/// exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineRequest {
    Level(OptLevel),
    Passes(PassPipeline),
}

impl PipelineRequest {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if let Ok(level) = text.parse::<OptLevel>() {
            return Ok(PipelineRequest::Level(level));
        }
        Ok(PipelineRequest::Passes(PassPipeline::parse(text)?))
    }

    pub fn is_pass_list(&self) -> bool {
        matches!(self, PipelineRequest::Passes(_))
    }
}

impl Default for PipelineRequest {
    fn default() -> Self {
        PipelineRequest::Level(OptLevel::O2)
    }
}

impl fmt::Display for PipelineRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineRequest::Level(level) => write!(f, "{}", level),
            PipelineRequest::Passes(p) => write!(f, "{}", p.text),
        }
    }
}

/// A frontend paired with the request it was run with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub frontend: Frontend,
    pub request: PipelineRequest,
}

impl Invocation {
    pub fn new(frontend: Frontend, request: PipelineRequest) -> Self {
        Self { frontend, request }
    }

    pub fn level(frontend: Frontend, level: OptLevel) -> Self {
        Self::new(frontend, PipelineRequest::Level(level))
    }

    /// Reject requests the frontend's compilation model cannot express.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.request.is_pass_list() && !self.frontend.accepts_pass_list() {
            return Err(ParseError::CustomPassesUnsupported {
                frontend: self.frontend,
            });
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_from_extension() {
        assert_eq!(Frontend::from_extension("ll"), Ok(Frontend::LlvmIr));
        assert_eq!(Frontend::from_extension("cc"), Ok(Frontend::Cpp));
        assert_eq!(Frontend::from_extension("rs"), Ok(Frontend::Rust));
        assert_eq!(
            Frontend::from_extension("java"),
            Err(ParseError::UnsupportedFileKind("java".into()))
        );
    }

    #[test]
    fn frontend_from_path_without_extension() {
        assert!(matches!(
            Frontend::from_path(Path::new("Makefile")),
            Err(ParseError::UnsupportedFileKind(_))
        ));
        assert_eq!(Frontend::from_path(Path::new("src/qs.c")), Ok(Frontend::C));
    }

    #[test]
    fn opt_level_spellings() {
        assert_eq!("O2".parse::<OptLevel>(), Ok(OptLevel::O2));
        assert_eq!("-Oz".parse::<OptLevel>(), Ok(OptLevel::Oz));
        assert_eq!("default<O3>".parse::<OptLevel>(), Ok(OptLevel::O3));
        assert!("O4".parse::<OptLevel>().is_err());
    }

    #[test]
    fn flat_pipeline() {
        let p = PassPipeline::parse("sroa,instcombine").unwrap();
        assert_eq!(p.pass_names(), vec!["sroa", "instcombine"]);
        assert!(p.passes.iter().all(|s| s.nested.is_empty()));
    }

    #[test]
    fn nested_pipeline_flattens_adaptors() {
        let p = PassPipeline::parse("function(sroa, loop-mssa(licm)),globaldce").unwrap();
        assert_eq!(p.passes.len(), 2);
        assert_eq!(p.passes[0].name, "function");
        assert_eq!(p.pass_names(), vec!["sroa", "licm", "globaldce"]);
    }

    #[test]
    fn parameterised_pass_keeps_parameters() {
        let p = PassPipeline::parse("simplifycfg<bonus-inst-threshold=1;no-sink>").unwrap();
        assert_eq!(p.pass_names(), vec!["simplifycfg<bonus-inst-threshold=1;no-sink>"]);
    }

    #[test]
    fn malformed_pipelines_are_rejected() {
        for text in ["", "sroa,,instcombine", "function(sroa", "sroa)"] {
            assert!(
                matches!(
                    PassPipeline::parse(text),
                    Err(ParseError::InvalidPipeline { .. })
                ),
                "expected '{}' to be rejected",
                text
            );
        }
    }

    #[test]
    fn request_prefers_opt_level() {
        assert_eq!(
            PipelineRequest::parse("O1").unwrap(),
            PipelineRequest::Level(OptLevel::O1)
        );
        assert!(PipelineRequest::parse("sroa").unwrap().is_pass_list());
    }

    #[test]
    fn pass_list_rejected_for_level_only_frontends() {
        let request = PipelineRequest::parse("sroa,instcombine").unwrap();
        let inv = Invocation::new(Frontend::C, request.clone());
        assert_eq!(
            inv.validate(),
            Err(ParseError::CustomPassesUnsupported {
                frontend: Frontend::C
            })
        );
        assert!(Invocation::new(Frontend::LlvmIr, request).validate().is_ok());
        assert!(Invocation::level(Frontend::Rust, OptLevel::O3).validate().is_ok());
    }
}
