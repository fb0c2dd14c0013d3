//! Stepwise: multi-step tool loops for LLM providers
//!
//! Drives a model through as many turns as it needs: each turn's tool calls
//! are dispatched against caller-declared tools and their results fed back,
//! until the model answers in plain text. The same loop runs blocking or
//! streamed, and can force schema-conforming structured output by offering
//! the schema as a synthetic return tool.
//!
//! Providers plug in through [`provider::ModelProvider`]; this crate does no
//! HTTP itself.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stepwise::prelude::*;
//!
//! # async fn example(provider: Arc<dyn ModelProvider>) -> stepwise::error::Result<()> {
//! let add = AgentTool::new(
//!     "add",
//!     "Add two integers",
//!     AgentToolParameters::object()
//!         .integer("a", "left operand", true)
//!         .integer("b", "right operand", true)
//!         .build(),
//!     |args, _ctx| async move { Ok(serde_json::json!(args.get_i64("a")? + args.get_i64("b")?)) },
//! );
//!
//! let request = TextRequest::new("openai:gpt-4o".parse()?, vec![ModelMessage::user("What is 1 + 2?")])
//!     .with_tool(Arc::new(add));
//! let result = generate_text(provider.as_ref(), request, GenerateOptions::default()).await?;
//! println!("{} ({} steps)", result.text, result.steps.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod stop;
pub mod tools;
pub mod types;
pub mod util;
