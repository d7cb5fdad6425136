//! A scripted [`CompletionService`] for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::{StreamExt, future, stream};

use crate::client::{CompletionService, FragmentStream};
use crate::error::{Error, Result};
use crate::types::ChatCompletionParams;

enum Script {
    Fragments(Vec<Result<String>>),
    Stall(Vec<String>),
    OpenError(Error),
    NeverOpens,
}

/// Plays back one scripted reply per call and records every request it receives.
#[derive(Default)]
pub struct ScriptedService {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatCompletionParams>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply that streams `fragments` and ends cleanly.
    pub fn reply(self, fragments: &[&str]) -> Self {
        self.push(Script::Fragments(
            fragments.iter().map(|f| Ok(f.to_string())).collect(),
        ))
    }

    /// Queue a reply that streams `fragments` and then fails with `error`.
    pub fn reply_then_fail(self, fragments: &[&str], error: Error) -> Self {
        let mut items: Vec<Result<String>> = fragments.iter().map(|f| Ok(f.to_string())).collect();
        items.push(Err(error));
        self.push(Script::Fragments(items))
    }

    /// Queue a call that fails before any fragment is produced.
    pub fn fail_to_open(self, error: Error) -> Self {
        self.push(Script::OpenError(error))
    }

    /// Queue a reply that streams `fragments` and then goes quiet without ending.
    pub fn reply_then_stall(self, fragments: &[&str]) -> Self {
        self.push(Script::Stall(
            fragments.iter().map(|f| f.to_string()).collect(),
        ))
    }

    /// Queue a call that never gets a response.
    pub fn never_open(self) -> Self {
        self.push(Script::NeverOpens)
    }

    fn push(self, script: Script) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ChatCompletionParams> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl CompletionService for ScriptedService {
    async fn stream_chat(&self, params: ChatCompletionParams) -> Result<FragmentStream> {
        self.requests.lock().unwrap().push(params);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Fragments(items)) => Ok(Box::pin(stream::iter(items))),
            Some(Script::Stall(fragments)) => Ok(Box::pin(
                stream::iter(fragments.into_iter().map(Ok)).chain(stream::pending()),
            )),
            Some(Script::OpenError(err)) => Err(err),
            Some(Script::NeverOpens) => future::pending().await,
            None => Err(Error::connection("no scripted reply left", None)),
        }
    }
}
