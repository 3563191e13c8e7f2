//! Boundary-only collaborator traits (spec §6, §1: "thin adapters ...
//! not where the engineering lives").
//!
//! `IssueCommenter`, `PrLabeler`, and `WebServices` are specified only at
//! their signature: the orchestrator depends on them, but real
//! GitHub/web-service adapters live outside this crate (and outside this
//! exercise entirely). The `Noop` implementations exist so the
//! orchestrator compiles and runs standalone without a real PR or web
//! service behind it. `WebhookPoster` is the one collaborator with a
//! real implementation, in `plogon-webhook`.

use anyhow::Result;

/// Posts and manages comments on a pull request (spec §6). Out of scope;
/// specified at the boundary only.
pub trait IssueCommenter {
    /// Add a comment with the given body to `issue`.
    fn add_comment(&mut self, issue: u64, body: &str) -> Result<()>;
    /// Strike through this adapter's own prior comments on `issue`,
    /// returning whether any were found.
    fn cross_out_my_comments(&mut self, issue: u64) -> Result<bool>;
}

/// Sets the label set on a pull request (spec §6). Out of scope;
/// specified at the boundary only.
pub trait PrLabeler {
    /// Replace the label set on `issue` with `labels`.
    fn set_labels(&mut self, issue: u64, labels: &[String]) -> Result<()>;
}

/// Registers and retrieves PR↔version/message mappings with an external
/// web service (spec §6). Out of scope; specified at the boundary only.
pub trait WebServices {
    /// Record which PR produced a given internal name/channel pairing.
    fn register_pr_number(&mut self, internal_name: &str, channel: &str, pr_number: u64) -> Result<()>;
    /// Look up a previously registered PR number.
    fn get_pr_number(&self, internal_name: &str, channel: &str) -> Result<Option<u64>>;
    /// Record a webhook/chat message id associated with a task.
    fn register_message_id(&mut self, internal_name: &str, channel: &str, message_id: &str) -> Result<()>;
    /// Retrieve message ids previously registered for a task.
    fn get_message_ids(&self, internal_name: &str, channel: &str) -> Result<Vec<String>>;
    /// Stage build metadata for downstream consumers ahead of execution.
    fn stage_plugin_build(&mut self, internal_name: &str, channel: &str, commit: &str) -> Result<()>;
}

/// `IssueCommenter` that does nothing — the default when no PR
/// annotator is configured.
#[derive(Debug, Default)]
pub struct NoopIssueCommenter;

impl IssueCommenter for NoopIssueCommenter {
    fn add_comment(&mut self, _issue: u64, _body: &str) -> Result<()> {
        Ok(())
    }

    fn cross_out_my_comments(&mut self, _issue: u64) -> Result<bool> {
        Ok(false)
    }
}

/// `PrLabeler` that does nothing.
#[derive(Debug, Default)]
pub struct NoopPrLabeler;

impl PrLabeler for NoopPrLabeler {
    fn set_labels(&mut self, _issue: u64, _labels: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `WebServices` that does nothing and reports nothing registered.
#[derive(Debug, Default)]
pub struct NoopWebServices;

impl WebServices for NoopWebServices {
    fn register_pr_number(&mut self, _internal_name: &str, _channel: &str, _pr_number: u64) -> Result<()> {
        Ok(())
    }

    fn get_pr_number(&self, _internal_name: &str, _channel: &str) -> Result<Option<u64>> {
        Ok(None)
    }

    fn register_message_id(&mut self, _internal_name: &str, _channel: &str, _message_id: &str) -> Result<()> {
        Ok(())
    }

    fn get_message_ids(&self, _internal_name: &str, _channel: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn stage_plugin_build(&mut self, _internal_name: &str, _channel: &str, _commit: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_collaborators_are_inert() {
        let mut commenter = NoopIssueCommenter;
        assert!(commenter.add_comment(1, "hi").is_ok());
        assert_eq!(commenter.cross_out_my_comments(1).unwrap(), false);

        let mut labeler = NoopPrLabeler;
        assert!(labeler.set_labels(1, &["needs-review".to_string()]).is_ok());

        let mut web = NoopWebServices;
        web.register_pr_number("FooPlugin", "stable", 42).unwrap();
        assert_eq!(web.get_pr_number("FooPlugin", "stable").unwrap(), None);
        assert!(web.get_message_ids("FooPlugin", "stable").unwrap().is_empty());
    }
}
