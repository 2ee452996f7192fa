//! Statement templates.
//!
//! Templates use Handlebars syntax. `{{Iter}}` expands to the 1-based
//! iteration index; the random helpers below draw from the generator the
//! renderer was created with:
//!
//! ```text
//! INSERT INTO t (id, score) VALUES ({{Iter}}, {{RandInt63n 1000}})
//! ```
//!
//! | helper               | result                                 |
//! |----------------------|----------------------------------------|
//! | `Seed n`             | reseeds the generator, renders nothing |
//! | `RandInt63`          | non-negative 63-bit integer            |
//! | `RandInt63n n`       | integer in `[0, n)`, `n` must be > 0   |
//! | `RandFloat32`        | `f32` in `[0, 1)`                      |
//! | `RandFloat64`        | `f64` in `[0, 1)`                      |
//! | `RandExpFloat64`     | exponential, rate 1                    |
//! | `RandNormFloat64`    | standard normal                        |

use std::sync::{Arc, Mutex, PoisonError};

use handlebars::{
    Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, RenderErrorReason,
    ScopedJson, Template,
};
use serde_json::Value;

use crate::context::{Generator, IterationContext};
use crate::error::{Error, Result};

/// A template compiled once and shared read-only between workers.
#[derive(Debug, Clone)]
pub struct StatementTemplate {
    name: String,
    template: Arc<Template>,
}

impl StatementTemplate {
    /// Parse `source`. `name` identifies the template in errors.
    pub fn compile(name: &str, source: &str) -> Result<Self> {
        let template = Template::compile(source).map_err(|e| Error::TemplateSyntax {
            name: name.to_string(),
            source: Box::new(e),
        })?;
        Ok(Self {
            name: name.to_string(),
            template: Arc::new(template),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind the template to a generator. One renderer per worker.
    pub fn renderer(&self, generator: Generator) -> Renderer {
        let generator = Arc::new(Mutex::new(generator));

        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_template(&self.name, (*self.template).clone());
        for op in RandomOp::ALL {
            registry.register_helper(
                op.name(),
                Box::new(RandomHelper {
                    op,
                    generator: Arc::clone(&generator),
                }),
            );
        }

        Renderer {
            name: self.name.clone(),
            registry,
        }
    }
}

/// Renders statements for one worker.
pub struct Renderer {
    name: String,
    registry: Handlebars<'static>,
}

impl Renderer {
    /// Render the statement for iteration `iter`.
    pub fn render(&self, iter: u64) -> Result<String> {
        self.registry
            .render(&self.name, &IterationContext::new(iter))
            .map_err(|e| Error::TemplateRender {
                name: self.name.clone(),
                iter,
                source: Box::new(e),
            })
    }
}

#[derive(Debug, Clone, Copy)]
enum RandomOp {
    Seed,
    Int63,
    Int63n,
    Float32,
    Float64,
    ExpFloat64,
    NormFloat64,
}

impl RandomOp {
    const ALL: [RandomOp; 7] = [
        RandomOp::Seed,
        RandomOp::Int63,
        RandomOp::Int63n,
        RandomOp::Float32,
        RandomOp::Float64,
        RandomOp::ExpFloat64,
        RandomOp::NormFloat64,
    ];

    fn name(self) -> &'static str {
        match self {
            RandomOp::Seed => "Seed",
            RandomOp::Int63 => "RandInt63",
            RandomOp::Int63n => "RandInt63n",
            RandomOp::Float32 => "RandFloat32",
            RandomOp::Float64 => "RandFloat64",
            RandomOp::ExpFloat64 => "RandExpFloat64",
            RandomOp::NormFloat64 => "RandNormFloat64",
        }
    }
}

struct RandomHelper {
    op: RandomOp,
    generator: Arc<Mutex<Generator>>,
}

impl RandomHelper {
    fn int_param(&self, h: &Helper<'_>) -> Result<i64, RenderError> {
        let name = self.op.name();
        let param = h
            .param(0)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex(name, 0))?;
        param.value().as_i64().ok_or_else(|| {
            RenderErrorReason::Other(format!(
                "{name} expects an integer argument, got {}",
                param.value()
            ))
            .into()
        })
    }
}

impl HelperDef for RandomHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        // Workers never share a generator, so the lock is uncontended.
        let mut generator = self
            .generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let value = match self.op {
            RandomOp::Seed => {
                let seed = self.int_param(h)?;
                generator.seed(seed);
                Value::String(String::new())
            }
            RandomOp::Int63 => Value::from(generator.int63()),
            RandomOp::Int63n => {
                let n = self.int_param(h)?;
                let v = generator
                    .int63n(n)
                    .map_err(|e| RenderErrorReason::Other(e.to_string()))?;
                Value::from(v)
            }
            RandomOp::Float32 => Value::String(generator.float32().to_string()),
            RandomOp::Float64 => Value::from(generator.float64()),
            RandomOp::ExpFloat64 => Value::from(generator.exp_float64()),
            RandomOp::NormFloat64 => Value::from(generator.norm_float64()),
        };
        Ok(ScopedJson::Derived(value))
    }
}
