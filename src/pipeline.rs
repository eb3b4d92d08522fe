//! The devirtualization pipeline: an explicit context value that sequences
//! discovery, matching and translation over one module arena.
//!
//! Stages run in dependency order and abort on the first fatal error;
//! per-method translation failures only mark their method and the run
//! continues. After the opcode table is finalized, translation over the
//! method worklist is embarrassingly parallel: the table and arena are
//! read-only, each worker forks its own cipher-stream cursor, and the
//! resolver serializes its stream access internally.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::{
    cil::{encode_instructions, CilFlow, Operand},
    crypto::CipherStream,
    locator::{self, VmDiscovery},
    matcher::HandlerMatcher,
    metadata::{method::MethodBody, module::Module, token::Token},
    translator::{MethodTranslator, TokenResolver, TranslationReport},
    vm::{discover_opcodes, OpcodeTable, SpecialOpcode},
    Result,
};

/// Pipeline tuning knobs, threaded explicitly through the run.
#[derive(Debug, Clone)]
pub struct DevirtOptions {
    /// Fan method translation out across the rayon pool.
    pub parallel: bool,
}

impl Default for DevirtOptions {
    fn default() -> Self {
        DevirtOptions { parallel: true }
    }
}

/// Everything a run produces: the discovery results, the finalized table,
/// the recovered bodies keyed by method token, and the per-method report.
///
/// The external assembly writer patches the recovered bodies over their
/// stubs and emits the final image.
pub struct DevirtOutcome {
    /// Resource/key/VM-type discovery results.
    pub discovery: VmDiscovery,
    /// The finalized opcode table.
    pub table: OpcodeTable,
    /// Recovered bodies by method token.
    pub bodies: FxHashMap<Token, MethodBody>,
    /// Per-method outcomes.
    pub report: TranslationReport,
}

/// The pipeline driver.
pub struct Devirtualizer<'m> {
    module: &'m Module,
    options: DevirtOptions,
}

impl<'m> Devirtualizer<'m> {
    /// A driver with default options.
    #[must_use]
    pub fn new(module: &'m Module) -> Self {
        Devirtualizer {
            module,
            options: DevirtOptions::default(),
        }
    }

    /// A driver with explicit options.
    #[must_use]
    pub fn with_options(module: &'m Module, options: DevirtOptions) -> Self {
        Devirtualizer { module, options }
    }

    /// Run the full pipeline.
    ///
    /// # Errors
    /// Fatal discovery errors (`ResourceNotFound`, `KeyUnavailable`,
    /// `ModulusMissing`, `DispatcherNotFound`) and cipher-stream
    /// construction failures abort the run. Per-method failures land in the
    /// outcome's report instead.
    pub fn run(&self) -> Result<DevirtOutcome> {
        let discovery = locator::locate(self.module)?;

        let Some(resource) = self.module.resource(&discovery.resource_name) else {
            return Err(crate::Error::ResourceNotFound(discovery.resource_name));
        };
        let instruction_stream = CipherStream::new(resource.data.clone(), &discovery.key)?;
        log::info!(
            "cipher stream ready: {} plaintext bytes in {}-byte blocks",
            instruction_stream.length(),
            discovery.key.block_size()
        );

        let mut opcodes = discover_opcodes(self.module, discovery.vm_type)?;
        let matcher = HandlerMatcher::new(self.module);
        let identified = matcher.identify_all(&mut opcodes);
        log::info!("identified {identified} of {} virtual opcodes", opcodes.len());

        let table = OpcodeTable::build(opcodes);
        if table.has_special(SpecialOpcode::EazCall) {
            log::debug!("build uses virtualized calls; recovered bodies may call other stubs");
        }

        // The resolver gets its own cursor over the same decrypted view, so
        // instruction reads and token lookups never fight over a position.
        let resolver = TokenResolver::new(self.module, instruction_stream.fork());
        let translator = MethodTranslator::new(&table, &resolver);

        let worklist = self.find_virtualized_methods(discovery.vm_type);
        log::info!("translating {} virtualized method(s)", worklist.len());

        let results: Vec<(Token, Result<MethodBody>)> = if self.options.parallel {
            worklist
                .par_iter()
                .map(|&(token, position)| {
                    let mut cursor = instruction_stream.fork();
                    (token, translator.translate(&mut cursor, position))
                })
                .collect()
        } else {
            worklist
                .iter()
                .map(|&(token, position)| {
                    let mut cursor = instruction_stream.fork();
                    (token, translator.translate(&mut cursor, position))
                })
                .collect()
        };

        let mut bodies = FxHashMap::default();
        let mut report = TranslationReport::new();
        for (token, result) in results {
            match result {
                Ok(body) => {
                    match encode_instructions(&body.instructions, |_| Token::new(0x7000_0000)) {
                        Ok(encoded) => {
                            report.record_success(token, body.instructions.len(), encoded.len());
                            bodies.insert(token, body);
                        }
                        Err(error) => report.record_failure(token, &error),
                    }
                }
                Err(error) => report.record_failure(token, &error),
            }
        }

        log::info!("{}", report.render().trim_end());

        Ok(DevirtOutcome {
            discovery,
            table,
            bodies,
            report,
        })
    }

    /// A method is a dispatcher stub when its body calls into the VM type
    /// and carries the stream position of its serialized body as a decimal
    /// string literal.
    fn find_virtualized_methods(&self, vm_type: Token) -> Vec<(Token, u64)> {
        let mut worklist = Vec::new();

        for method in self.module.methods() {
            if method.declaring_type == vm_type {
                continue;
            }
            let Some(body) = method.body.as_ref() else {
                continue;
            };

            let calls_vm = body.instructions.iter().any(|instruction| {
                if instruction.op.flow() != CilFlow::Call {
                    return false;
                }
                let Operand::Token(target) = &instruction.operand else {
                    return false;
                };
                self.module
                    .method(*target)
                    .is_some_and(|callee| callee.declaring_type == vm_type)
            });
            if !calls_vm {
                continue;
            }

            let position = body.instructions.iter().find_map(|instruction| {
                match &instruction.operand {
                    Operand::String(literal) => literal.parse::<u64>().ok(),
                    _ => None,
                }
            });

            if let Some(position) = position {
                worklist.push((method.token, position));
            }
        }

        worklist
    }
}
