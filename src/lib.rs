//! Source-to-source translation of OpenMP-annotated C into calls to a cooperative
//! task-parallel runtime.
//!
//! The pipeline runs once per file: pragmas are encoded as sentinel calls, the result is
//! parsed, every function is traversed into a region tree, regions are rewritten
//! innermost first and the edits are rendered over the encoded source.

pub mod codegen;
pub mod config;
pub mod context;
pub mod directive;
mod error;
pub mod parser;
pub mod region;
pub mod validate;

use log::{debug, info};

pub use config::{Config, RuntimeApi};
pub use error::{Error, TranslationError, TranslationErrorKind};
pub use parser::preprocess::PragmaRecords;

use codegen::RuntimeUses;
use context::TranslationContext;
use parser::rewriter::Rewriter;
use validate::SafetyChecks;

/// Translates one C source file.
pub fn translate(source: &str, config: &Config) -> Result<String, Error> {
    translate_with_records(source, config, PragmaRecords::default())
}

/// Translates one C source file, checking the sentinels against `records` in addition to
/// the directives encoded from the source itself.
pub fn translate_with_records(
    source: &str,
    config: &Config,
    records: PragmaRecords,
) -> Result<String, Error> {
    let encoded = parser::preprocess::encode(source, &config.sentinel);
    let mut known = encoded.records;
    known.merge(records)?;
    info!("{} directive record(s)", known.len());

    let unit = parser::grammar::parse(&encoded.source)?;
    let ctx = TranslationContext::new(&unit, config);
    SafetyChecks::new(&ctx).check_globals()?;

    let mut rw = Rewriter::new(&encoded.source);
    let mut uses = RuntimeUses::default();
    let mut discovered = vec![];

    for function in unit.functions() {
        let regions = region::builder::build(function, &ctx)?;
        discovered.extend(regions.discovered);

        let is_entry = config.is_entry(&function.name);
        let exits = if is_entry {
            let closures: Vec<_> = regions
                .tree
                .iter()
                .filter(|r| r.directive.is_closure())
                .map(|r| r.range())
                .collect();
            codegen::entry::rewrite_returns(function, &closures, &mut rw)?
        } else {
            0
        };

        codegen::generate(function, regions.tree, &ctx, &mut rw, &mut uses)?;
        if is_entry {
            debug!("wrapping entry function {}", function.name);
            codegen::entry::wrap(function, &ctx, &mut rw, exits > 0)?;
        }
    }
    known.validate(discovered)?;

    if rw.is_modified() {
        rw.prepend(0, uses.prologue(&config.runtime));
    }
    Ok(rw.render())
}
