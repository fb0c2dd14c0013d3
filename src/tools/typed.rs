//! Tools with serde-typed input and output.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolExecutionContext};
use super::types::AgentToolParameters;
use crate::error::StepwiseError;

type TypedHandler<I, O> =
    dyn Fn(I, ToolExecutionContext) -> BoxFuture<'static, Result<O, StepwiseError>> + Send + Sync;

/// A tool whose arguments decode into `I` and whose result encodes from `O`.
pub struct TypedTool<I, O> {
    name: String,
    description: String,
    parameters: AgentToolParameters,
    handler: Arc<TypedHandler<I, O>>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> TypedTool<I, O>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(I, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, StepwiseError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |input, ctx| Box::pin(handler(input, ctx))),
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<I, O> Tool for TypedTool<I, O>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, StepwiseError> {
        let input: I = args.deserialize()?;
        let output = (self.handler)(input, ctx.clone()).await?;
        Ok(serde_json::to_value(output)?)
    }
}

impl<I, O> std::fmt::Debug for TypedTool<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Weather {
        city: String,
    }

    #[derive(Serialize)]
    struct Forecast {
        city: String,
        celsius: i32,
    }

    #[tokio::test]
    async fn decodes_input_and_encodes_output() {
        let tool = TypedTool::new(
            "weather",
            "Get the weather",
            AgentToolParameters::object().string("city", "City name", true).build(),
            |input: Weather, _ctx| async move {
                Ok(Forecast {
                    city: input.city,
                    celsius: 21,
                })
            },
        );

        let args = ToolArguments::parse(r#"{"city":"Oslo"}"#).unwrap();
        let out = tool.execute(&args, &ToolExecutionContext::default()).await.unwrap();
        assert_eq!(out, serde_json::json!({"city": "Oslo", "celsius": 21}));

        let bad = ToolArguments::parse(r#"{"town":"Oslo"}"#).unwrap();
        assert!(matches!(
            tool.execute(&bad, &ToolExecutionContext::default()).await,
            Err(StepwiseError::InvalidArgument(_))
        ));
    }
}
