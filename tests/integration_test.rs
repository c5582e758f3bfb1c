//! Integration tests for bugbridge
//!
//! These tests drive whole webhook deliveries through the bridge against
//! in-memory Bugzilla and Jira fakes.

mod common;

use bugbridge::config::{RuleConfig, StatusPrecedence};
use bugbridge::pipeline::{ActionContext, IgnoreReason, Step, StepStatus};
use bugbridge::runner::{Disposition, Report};
use bugbridge::tracker::{EventTarget, FieldChange, Ticket, WebhookComment};
use bugbridge::{Outcome, Phase, StepRegistry, Trackers};
use common::*;
use std::collections::BTreeMap;

fn rule(tag: &str) -> RuleConfig {
    RuleConfig::new(tag, "JBI")
}

fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn steps(names: &[&str]) -> Option<Vec<String>> {
    Some(names.iter().map(|n| n.to_string()).collect())
}

fn outcome(disposition: &Disposition) -> &Outcome {
    disposition.outcome().expect("pipeline ran")
}

fn seed_issue(h: &Harness, key: &str) {
    h.jira.put_issue(
        key,
        FakeIssue {
            project: "JBI".to_string(),
            ..Default::default()
        },
    );
}

mod routing_tests {
    use super::*;

    #[tokio::test]
    async fn test_unmatched_whiteboard_is_ignored() {
        let h = Harness::new(vec![rule("devtest")]);
        let d = h
            .deliver(request(ticket(1, "[other]"), EventTarget::Bug, vec![]))
            .await;

        assert!(matches!(d, Disposition::Ignored(IgnoreReason::NoMatchingRule)));
        assert!(d.is_success());
        assert!(h.jira.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tag_matches_inside_compound_token() {
        let h = Harness::new(vec![rule("devtest")]);
        let d = h
            .deliver(request(ticket(1, "[devtest-triage] [foo]"), EventTarget::Bug, vec![]))
            .await;

        match d {
            Disposition::Processed { tag, phase, .. } => {
                assert_eq!(tag, "devtest");
                assert_eq!(phase, Phase::New);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tag_after_dash_does_not_match() {
        let h = Harness::new(vec![rule("devtest")]);

        for whiteboard in ["[foo-devtest]", "[a-devtest-b]"] {
            let d = h
                .deliver(request(ticket(1, whiteboard), EventTarget::Bug, vec![]))
                .await;
            assert!(
                matches!(d, Disposition::Ignored(IgnoreReason::NoMatchingRule)),
                "{}",
                whiteboard
            );
        }
        assert!(h.jira.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_rule_is_ignored() {
        let mut disabled = rule("devtest");
        disabled.enabled = false;
        let h = Harness::new(vec![disabled]);

        let d = h
            .deliver(request(ticket(1, "[devtest]"), EventTarget::Bug, vec![]))
            .await;

        match d {
            Disposition::Ignored(IgnoreReason::RuleDisabled { tag }) => assert_eq!(tag, "devtest"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(h.jira.calls().is_empty());
    }

    #[tokio::test]
    async fn test_private_bug_makes_no_downstream_calls() {
        let h = Harness::new(vec![rule("devtest")]);
        let private = Ticket {
            is_private: true,
            ..ticket(1, "[devtest]")
        };

        let d = h.deliver(request(private, EventTarget::Bug, vec![])).await;

        assert!(matches!(
            d,
            Disposition::Ignored(IgnoreReason::PrivateNotAllowed { .. })
        ));
        assert_eq!(h.bugzilla.calls(), vec!["get_ticket 1"]);
        assert!(h.jira.calls().is_empty());
    }

    #[tokio::test]
    async fn test_private_bug_refresh_uses_server_copy() {
        let mut allowed = rule("devtest");
        allowed.allow_private = true;
        let h = Harness::new(vec![allowed]);

        // Payload is redacted; Bugzilla holds the real whiteboard
        h.bugzilla.put_ticket(Ticket {
            is_private: true,
            ..ticket(1, "[devtest]")
        });
        let redacted = Ticket {
            is_private: true,
            ..Ticket::new(1)
        };

        let d = h.deliver(request(redacted, EventTarget::Bug, vec![])).await;

        assert!(matches!(d, Disposition::Processed { phase: Phase::New, .. }));
        assert_eq!(h.jira.issue_keys(), vec!["JBI-1"]);
    }

    #[tokio::test]
    async fn test_private_refresh_failure_is_an_error() {
        let h = Harness::new(vec![rule("devtest")]);
        h.bugzilla.set_down(true);
        let private = Ticket {
            is_private: true,
            ..ticket(1, "[devtest]")
        };

        let result = h
            .bridge
            .handle(request(private, EventTarget::Bug, vec![]))
            .await;

        assert!(result.is_err());
        assert!(h.jira.calls().is_empty());
    }
}

mod new_issue_tests {
    use super::*;

    #[tokio::test]
    async fn test_new_bug_creates_and_links_issue() {
        let h = Harness::new(vec![rule("devtest")]);
        h.bugzilla
            .put_comments(1, vec![comment(10, "Steps to reproduce"), comment(11, "me too")]);

        let d = h
            .deliver(request(ticket(1, "[devtest]"), EventTarget::Bug, vec![]))
            .await;

        let outcome = outcome(&d);
        assert!(matches!(outcome, Outcome::Completed { .. }));
        assert_eq!(outcome.issue_key(), Some("JBI-1"));
        let names: Vec<_> = outcome.steps().iter().map(|r| r.step).collect();
        assert_eq!(
            names,
            vec![
                "create_issue",
                "maybe_delete_duplicate",
                "add_link_to_bugzilla",
                "add_link_to_jira"
            ]
        );

        let issue = h.jira.issue("JBI-1").unwrap();
        assert_eq!(issue.summary, "Bug 1 summary");
        assert_eq!(issue.description, "Steps to reproduce");
        assert_eq!(issue.issue_type, "Bug");
        assert_eq!(
            issue.labels.into_iter().collect::<Vec<_>>(),
            vec!["[devtest]", "bugzilla", "devtest"]
        );
        assert_eq!(
            issue.remote_links,
            vec![(
                format!("{}/show_bug.cgi?id=1", BUGZILLA_URL),
                "Bugzilla Bug 1".to_string()
            )]
        );
        assert_eq!(
            h.bugzilla.see_also(1),
            vec![format!("{}/browse/JBI-1", JIRA_URL)]
        );
    }

    #[tokio::test]
    async fn test_redelivered_new_event_leaves_one_issue() {
        let h = Harness::new(vec![rule("devtest")]);
        let stale = request(ticket(1, "[devtest]"), EventTarget::Bug, vec![]);

        let first = h.deliver(stale.clone()).await;
        let second = h.deliver(stale).await;

        assert!(matches!(outcome(&first), Outcome::Completed { .. }));
        match outcome(&second) {
            Outcome::Aborted {
                step, issue_key, ..
            } => {
                assert_eq!(*step, "maybe_delete_duplicate");
                assert_eq!(issue_key.as_deref(), Some("JBI-1"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(second.is_success());
        assert_eq!(h.jira.issue_keys(), vec!["JBI-1"]);
        assert!(h.jira.calls().contains(&"delete_issue JBI-2".to_string()));
        assert_eq!(h.bugzilla.see_also(1).len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_link_wins_over_new_issue() {
        let h = Harness::new(vec![rule("devtest")]);
        seed_issue(&h, "JBI-99");
        h.bugzilla.put_ticket(linked_ticket(1, "[devtest]", "JBI-99"));

        let d = h
            .deliver(request(ticket(1, "[devtest]"), EventTarget::Bug, vec![]))
            .await;

        assert!(matches!(outcome(&d), Outcome::Aborted { .. }));
        assert_eq!(h.jira.issue_keys(), vec!["JBI-99"]);
        assert!(!h.jira.methods().contains(&"add_remote_link".to_string()));
        assert_eq!(
            h.bugzilla.see_also(1),
            vec![format!("{}/browse/JBI-99", JIRA_URL)]
        );
    }

    #[tokio::test]
    async fn test_link_to_jira_writes_see_also_only() {
        let mut r = rule("devtest");
        r.steps.new = steps(&["create_issue", "add_link_to_jira"]);
        let h = Harness::new(vec![r]);

        h.deliver(request(ticket(1, "[devtest]"), EventTarget::Bug, vec![]))
            .await;

        assert_eq!(
            h.bugzilla.see_also(1),
            vec![format!("{}/browse/JBI-1", JIRA_URL)]
        );
        assert!(h.jira.issue("JBI-1").unwrap().remote_links.is_empty());
        assert_eq!(h.jira.methods(), vec!["create_issue"]);
    }

    #[tokio::test]
    async fn test_link_to_bugzilla_adds_remote_link_only() {
        let mut r = rule("devtest");
        r.steps.new = steps(&["create_issue", "add_link_to_bugzilla"]);
        let h = Harness::new(vec![r]);

        h.deliver(request(ticket(1, "[devtest]"), EventTarget::Bug, vec![]))
            .await;

        assert_eq!(
            h.jira.issue("JBI-1").unwrap().remote_links,
            vec![(
                format!("{}/show_bug.cgi?id=1", BUGZILLA_URL),
                "Bugzilla Bug 1".to_string()
            )]
        );
        assert!(h.bugzilla.see_also(1).is_empty());
    }

    #[tokio::test]
    async fn test_label_sync_on_new_issue_adds_bugzilla_label() {
        let mut r = rule("devtest");
        r.sync_whiteboard_labels = false;
        r.labels_brackets = bugbridge::config::LabelsBrackets::No;
        r.steps.new = steps(&["create_issue", "sync_whiteboard_labels"]);
        let h = Harness::new(vec![r]);

        h.deliver(request(ticket(1, "[devtest] [perf]"), EventTarget::Bug, vec![]))
            .await;

        let labels: Vec<_> = h.jira.issue("JBI-1").unwrap().labels.into_iter().collect();
        assert_eq!(labels, vec!["bugzilla", "devtest", "perf"]);
    }

    #[tokio::test]
    async fn test_new_issue_assigns_known_user() {
        let mut r = rule("devtest");
        r.steps.new = steps(&["create_issue", "maybe_assign_jira_user"]);
        let h = Harness::new(vec![r]);
        h.jira.add_user("dev@example.com", "acct-1");

        let assigned = Ticket {
            assigned_to: Some("dev@example.com".to_string()),
            ..ticket(1, "[devtest]")
        };
        h.deliver(request(assigned, EventTarget::Bug, vec![])).await;

        assert_eq!(h.jira.issue("JBI-1").unwrap().assignee.as_deref(), Some("acct-1"));
    }
}

mod existing_issue_tests {
    use super::*;

    fn status_rule(precedence: StatusPrecedence) -> RuleConfig {
        let mut r = rule("devtest");
        r.steps.existing = steps(&["maybe_update_issue_status"]);
        r.status_map = map(&[
            ("ASSIGNED", "In Progress"),
            ("RESOLVED", "Closed"),
            ("FIXED", "Done"),
        ]);
        r.status_precedence = precedence;
        r
    }

    async fn status_change(
        h: &Harness,
        status: &str,
        resolution: &str,
        changes: Vec<FieldChange>,
    ) -> Disposition {
        seed_issue(h, "JBI-7");
        let bug = Ticket {
            status: Some(status.to_string()),
            resolution: Some(resolution.to_string()),
            ..linked_ticket(7, "[devtest]", "JBI-7")
        };
        h.deliver(request(bug, EventTarget::Bug, changes)).await
    }

    #[tokio::test]
    async fn test_mapped_status_transitions_issue() {
        let h = Harness::new(vec![status_rule(StatusPrecedence::Resolution)]);
        let d = status_change(
            &h,
            "ASSIGNED",
            "",
            vec![FieldChange::new("status", "NEW", "ASSIGNED")],
        )
        .await;

        assert!(matches!(outcome(&d), Outcome::Completed { .. }));
        assert_eq!(h.jira.calls(), vec!["set_status JBI-7 In Progress"]);
    }

    #[tokio::test]
    async fn test_unmapped_status_is_no_change() {
        let h = Harness::new(vec![status_rule(StatusPrecedence::Resolution)]);
        let d = status_change(
            &h,
            "UNCONFIRMED",
            "",
            vec![FieldChange::new("status", "NEW", "UNCONFIRMED")],
        )
        .await;

        assert_eq!(outcome(&d).steps()[0].status, "no_change");
        assert!(h.jira.calls().is_empty());
    }

    #[tokio::test]
    async fn test_status_untouched_without_status_change() {
        let h = Harness::new(vec![status_rule(StatusPrecedence::Resolution)]);
        status_change(
            &h,
            "ASSIGNED",
            "",
            vec![FieldChange::new("priority", "P3", "P1")],
        )
        .await;
        assert!(h.jira.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolution_takes_precedence_by_default() {
        let h = Harness::new(vec![status_rule(StatusPrecedence::Resolution)]);
        status_change(
            &h,
            "RESOLVED",
            "FIXED",
            vec![
                FieldChange::new("status", "ASSIGNED", "RESOLVED"),
                FieldChange::new("resolution", "", "FIXED"),
            ],
        )
        .await;
        assert_eq!(h.jira.calls(), vec!["set_status JBI-7 Done"]);
    }

    #[tokio::test]
    async fn test_status_precedence_uses_status() {
        let h = Harness::new(vec![status_rule(StatusPrecedence::Status)]);
        status_change(
            &h,
            "RESOLVED",
            "FIXED",
            vec![
                FieldChange::new("status", "ASSIGNED", "RESOLVED"),
                FieldChange::new("resolution", "", "FIXED"),
            ],
        )
        .await;
        assert_eq!(h.jira.calls(), vec!["set_status JBI-7 Closed"]);
    }

    #[tokio::test]
    async fn test_default_steps_update_summary_and_comment_changes() {
        let h = Harness::new(vec![rule("devtest")]);
        seed_issue(&h, "JBI-7");

        let d = h
            .deliver(request(
                linked_ticket(7, "[devtest]", "JBI-7"),
                EventTarget::Bug,
                vec![
                    FieldChange::new("summary", "Old", "Bug 7 summary"),
                    FieldChange::new("status", "NEW", "ASSIGNED"),
                ],
            ))
            .await;

        assert!(matches!(outcome(&d), Outcome::Completed { .. }));
        assert_eq!(h.jira.methods(), vec!["update_issue", "add_comment"]);
        let issue = h.jira.issue("JBI-7").unwrap();
        assert_eq!(issue.summary, "Bug 7 summary");
        assert_eq!(
            issue.comments,
            vec!["*(dev@example.com)* changed:\n* status: NEW → ASSIGNED"]
        );
    }

    #[tokio::test]
    async fn test_comment_with_status_change_is_forwarded() {
        let h = Harness::new(vec![rule("devtest")]);
        seed_issue(&h, "JBI-7");
        let bug = Ticket {
            status: Some("ASSIGNED".to_string()),
            comment: Some(WebhookComment {
                id: Some(20),
                body: Some("Root cause found".to_string()),
                number: Some(4),
                is_private: Some(false),
            }),
            ..linked_ticket(7, "[devtest]", "JBI-7")
        };

        let d = h
            .deliver(request(
                bug,
                EventTarget::Comment,
                vec![
                    FieldChange::new("comment", "", ""),
                    FieldChange::new("status", "NEW", "ASSIGNED"),
                ],
            ))
            .await;

        assert!(matches!(d, Disposition::Processed { phase: Phase::Existing, .. }));
        assert_eq!(h.jira.methods(), vec!["add_comment", "add_comment"]);
        assert_eq!(
            h.jira.issue("JBI-7").unwrap().comments,
            vec![
                "*(dev@example.com)* changed:\n* status: NEW → ASSIGNED",
                "*(dev@example.com)* commented: \n{quote}Root cause found{quote}",
            ]
        );
    }

    #[tokio::test]
    async fn test_whiteboard_change_syncs_labels() {
        let mut r = rule("devtest");
        r.steps.existing = steps(&["sync_whiteboard_labels"]);
        r.labels_brackets = bugbridge::config::LabelsBrackets::No;
        let h = Harness::new(vec![r]);
        h.jira.put_issue(
            "JBI-7",
            FakeIssue {
                labels: ["devtest", "old"].iter().map(|l| l.to_string()).collect(),
                ..Default::default()
            },
        );

        h.deliver(request(
            linked_ticket(7, "[devtest] [new]", "JBI-7"),
            EventTarget::Bug,
            vec![FieldChange::new("whiteboard", "[devtest] [old]", "[devtest] [new]")],
        ))
        .await;

        let labels: Vec<_> = h.jira.issue("JBI-7").unwrap().labels.into_iter().collect();
        assert_eq!(labels, vec!["bugzilla", "devtest", "new"]);
    }

    #[tokio::test]
    async fn test_unassigning_clears_assignee() {
        let mut r = rule("devtest");
        r.steps.existing = steps(&["maybe_assign_jira_user"]);
        let h = Harness::new(vec![r]);
        h.jira.put_issue(
            "JBI-7",
            FakeIssue {
                assignee: Some("acct-1".to_string()),
                ..Default::default()
            },
        );

        h.deliver(request(
            linked_ticket(7, "[devtest]", "JBI-7"),
            EventTarget::Bug,
            vec![FieldChange::new("assigned_to", "dev@example.com", "nobody@mozilla.org")],
        ))
        .await;

        assert_eq!(h.jira.methods(), vec!["set_assignee"]);
        assert_eq!(h.jira.issue("JBI-7").unwrap().assignee, None);
    }

    #[tokio::test]
    async fn test_tracker_failure_stops_pipeline() {
        let h = Harness::new(vec![rule("devtest")]);
        seed_issue(&h, "JBI-7");
        h.jira.fail_on("update_issue");

        let d = h
            .deliver(request(
                linked_ticket(7, "[devtest]", "JBI-7"),
                EventTarget::Bug,
                vec![
                    FieldChange::new("summary", "Old", "New"),
                    FieldChange::new("status", "NEW", "ASSIGNED"),
                ],
            ))
            .await;

        match outcome(&d) {
            Outcome::Failed { step, error, .. } => {
                assert_eq!(*step, "update_issue");
                assert!(error.is_transport());
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!d.is_success());
        assert!(!h.jira.methods().contains(&"add_comment".to_string()));

        let report = Report::new(7, &d);
        assert_eq!(report.status, "failed");
        assert_eq!(report.failed_step, Some("update_issue"));
    }

    fn addons_rule() -> RuleConfig {
        let mut r = RuleConfig::new("addons", "ADDONS");
        r.steps.existing = steps(&["maybe_update_issue_status", "maybe_update_issue_resolution"]);
        r.status_map = map(&[("ASSIGNED", "In Progress")]);
        r.resolution_map = map(&[("FIXED", "Done")]);
        r
    }

    fn addons_bug(status: &str, resolution: &str) -> Ticket {
        Ticket {
            status: Some(status.to_string()),
            resolution: Some(resolution.to_string()),
            ..linked_ticket(9, "[addons]", "ADDONS-3")
        }
    }

    #[tokio::test]
    async fn test_assigned_bug_sets_status_only() {
        let h = Harness::new(vec![addons_rule()]);
        seed_issue(&h, "ADDONS-3");

        h.deliver(request(
            addons_bug("ASSIGNED", ""),
            EventTarget::Bug,
            vec![FieldChange::new("status", "NEW", "ASSIGNED")],
        ))
        .await;

        assert_eq!(h.jira.calls(), vec!["set_status ADDONS-3 In Progress"]);
    }

    #[tokio::test]
    async fn test_fixed_bug_sets_resolution_only() {
        let h = Harness::new(vec![addons_rule()]);
        seed_issue(&h, "ADDONS-3");

        h.deliver(request(
            addons_bug("RESOLVED", "FIXED"),
            EventTarget::Bug,
            vec![
                FieldChange::new("status", "ASSIGNED", "RESOLVED"),
                FieldChange::new("resolution", "", "FIXED"),
            ],
        ))
        .await;

        assert_eq!(h.jira.calls(), vec!["set_resolution ADDONS-3 Done"]);
    }
}

mod comment_tests {
    use super::*;

    fn with_comment(is_private: bool) -> Ticket {
        Ticket {
            comment: Some(WebhookComment {
                id: Some(12),
                body: Some("Still broken on nightly".to_string()),
                number: Some(3),
                is_private: Some(is_private),
            }),
            ..linked_ticket(7, "[devtest]", "JBI-7")
        }
    }

    #[tokio::test]
    async fn test_comment_forwarded_once_without_update() {
        let h = Harness::new(vec![rule("devtest")]);
        seed_issue(&h, "JBI-7");

        let d = h
            .deliver(request(
                with_comment(false),
                EventTarget::Comment,
                vec![FieldChange::new("comment", "", "")],
            ))
            .await;

        assert!(matches!(d, Disposition::Processed { phase: Phase::Comment, .. }));
        assert_eq!(h.jira.methods(), vec!["add_comment"]);
        assert_eq!(
            h.jira.issue("JBI-7").unwrap().comments,
            vec!["*(dev@example.com)* commented: \n{quote}Still broken on nightly{quote}"]
        );
    }

    #[tokio::test]
    async fn test_private_comment_is_not_forwarded() {
        let h = Harness::new(vec![rule("devtest")]);
        seed_issue(&h, "JBI-7");

        let d = h
            .deliver(request(with_comment(true), EventTarget::Comment, vec![]))
            .await;

        assert_eq!(outcome(&d).steps()[0].status, "no_change");
        assert!(h.jira.calls().is_empty());
    }
}

mod components_tests {
    use super::*;

    fn components_rule(custom: &[&str]) -> RuleConfig {
        let mut r = rule("devtest");
        r.steps.new = steps(&["create_issue", "maybe_update_components"]);
        r.jira_components.set_custom_components = custom.iter().map(|c| c.to_string()).collect();
        r
    }

    fn toolbar_bug() -> Ticket {
        Ticket {
            product: Some("Firefox".to_string()),
            component: Some("Toolbar".to_string()),
            ..ticket(1, "[devtest]")
        }
    }

    #[tokio::test]
    async fn test_bug_component_becomes_issue_component() {
        let h = Harness::new(vec![components_rule(&[])]);
        h.jira.put_components("JBI", &[("37", "Toolbar")]);

        let d = h.deliver(request(toolbar_bug(), EventTarget::Bug, vec![])).await;

        assert!(matches!(outcome(&d), Outcome::Completed { .. }));
        assert!(h.jira.calls().contains(&"set_components JBI-1 37".to_string()));
        assert_eq!(h.jira.issue("JBI-1").unwrap().components, vec!["37"]);
    }

    #[tokio::test]
    async fn test_unknown_components_are_skipped() {
        let h = Harness::new(vec![components_rule(&["Remote Settings"])]);
        h.jira
            .put_components("JBI", &[("10000", "Component 1"), ("42", "Remote Settings")]);

        h.deliver(request(toolbar_bug(), EventTarget::Bug, vec![])).await;

        assert_eq!(h.jira.issue("JBI-1").unwrap().components, vec!["42"]);
    }

    #[tokio::test]
    async fn test_no_known_component_is_no_change() {
        let h = Harness::new(vec![components_rule(&[])]);

        let d = h.deliver(request(toolbar_bug(), EventTarget::Bug, vec![])).await;

        assert_eq!(outcome(&d).steps()[1].status, "no_change");
        assert_eq!(h.jira.methods(), vec!["create_issue", "project_components"]);
    }

    #[tokio::test]
    async fn test_rejected_components_field_is_no_change() {
        let h = Harness::new(vec![components_rule(&[])]);
        h.jira.put_components("JBI", &[("37", "Toolbar")]);
        h.jira.reject_components();

        let d = h.deliver(request(toolbar_bug(), EventTarget::Bug, vec![])).await;

        assert!(matches!(outcome(&d), Outcome::Completed { .. }));
        assert_eq!(outcome(&d).steps()[1].status, "no_change");
        assert!(h.jira.issue("JBI-1").unwrap().components.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_jira_fails_the_step() {
        let h = Harness::new(vec![components_rule(&[])]);
        h.jira.put_components("JBI", &[("37", "Toolbar")]);
        h.jira.fail_on("set_components");

        let d = h.deliver(request(toolbar_bug(), EventTarget::Bug, vec![])).await;

        match outcome(&d) {
            Outcome::Failed { step, .. } => assert_eq!(*step, "maybe_update_components"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

mod executor_tests {
    use super::*;
    use async_trait::async_trait;
    use bugbridge::{BridgeError, Result};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    enum Behavior {
        Succeed,
        Abort,
        Fail,
    }

    struct Scripted {
        name: &'static str,
        behavior: Behavior,
        log: Log,
    }

    #[async_trait]
    impl Step for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(
            &self,
            ctx: ActionContext,
            _trackers: &Trackers,
        ) -> Result<(ActionContext, StepStatus)> {
            self.log.lock().unwrap().push(self.name);
            match self.behavior {
                Behavior::Succeed => Ok((ctx, StepStatus::Success)),
                Behavior::Abort => Ok((ctx, StepStatus::Abort("nothing to do".to_string()))),
                Behavior::Fail => Err(BridgeError::Other("boom".to_string())),
            }
        }
    }

    fn harness(pipeline: &[&str], log: &Log) -> Harness {
        let mut registry = StepRegistry::builtin();
        for (name, behavior) in [
            ("first", Behavior::Succeed),
            ("second", Behavior::Succeed),
            ("third", Behavior::Succeed),
            ("stop", Behavior::Abort),
            ("explode", Behavior::Fail),
        ] {
            registry.register(Scripted {
                name,
                behavior,
                log: Arc::clone(log),
            });
        }
        let mut r = rule("devtest");
        r.steps.new = steps(pipeline);
        Harness::with_steps(vec![r], &registry)
    }

    async fn run(h: &Harness) -> Disposition {
        h.deliver(request(ticket(1, "[devtest]"), EventTarget::Bug, vec![]))
            .await
    }

    #[tokio::test]
    async fn test_steps_run_in_configured_order() {
        let log = Log::default();
        let h = harness(&["third", "first", "second"], &log);

        let d = run(&h).await;

        assert_eq!(*log.lock().unwrap(), vec!["third", "first", "second"]);
        let recorded: Vec<_> = outcome(&d).steps().iter().map(|r| r.step).collect();
        assert_eq!(recorded, vec!["third", "first", "second"]);
        assert!(matches!(outcome(&d), Outcome::Completed { .. }));
    }

    #[tokio::test]
    async fn test_abort_skips_remaining_steps() {
        let log = Log::default();
        let h = harness(&["first", "stop", "second"], &log);

        let d = run(&h).await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "stop"]);
        match outcome(&d) {
            Outcome::Aborted { step, reason, .. } => {
                assert_eq!(*step, "stop");
                assert_eq!(reason, "nothing to do");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(d.is_success());
    }

    #[tokio::test]
    async fn test_failure_names_the_step() {
        let log = Log::default();
        let h = harness(&["first", "explode", "second"], &log);

        let d = run(&h).await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "explode"]);
        match outcome(&d) {
            Outcome::Failed { step, error, steps, .. } => {
                assert_eq!(*step, "explode");
                assert_eq!(error.to_string(), "boom");
                assert_eq!(steps.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!d.is_success());
    }

    #[tokio::test]
    async fn test_empty_pipeline_completes() {
        let log = Log::default();
        let h = harness(&[], &log);

        let d = run(&h).await;

        assert!(matches!(outcome(&d), Outcome::Completed { .. }));
        assert!(outcome(&d).steps().is_empty());
        assert!(h.jira.calls().is_empty());
    }
}

mod config_tests {
    use super::*;
    use bugbridge::rules::{RegistryHandle, Resolution, RuleRegistry};
    use tempfile::TempDir;

    const RULES: &str = r#"
rules:
  - tag: devtest
    description: DevTest rule
    owner: [123]
    jira_project_key: JBI
    steps:
      existing: [update_issue, maybe_update_issue_status]
    status_map:
      ASSIGNED: In Progress
  - tag: flowstate
    owner: tbd
    jira_project_key: FLOW
    enabled: false
"#;

    #[test]
    fn test_load_rule_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, RULES).unwrap();

        let registry = RuleRegistry::load(&path, &StepRegistry::builtin()).unwrap();

        assert_eq!(registry.len(), 2);
        match registry.resolve("[DevTest] [flowstate]") {
            Resolution::Matched(rule) => {
                assert_eq!(rule.project_key, "JBI");
                assert_eq!(
                    rule.steps.names(Phase::Existing),
                    vec!["update_issue", "maybe_update_issue_status"]
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            registry.resolve("[flowstate]"),
            Resolution::Disabled(_)
        ));
    }

    #[test]
    fn test_unknown_step_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "rules:\n  - tag: devtest\n    jira_project_key: JBI\n    steps:\n      new: [create_issue, teleport]\n",
        )
        .unwrap();

        let err = RuleRegistry::load(&path, &StepRegistry::builtin()).unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = RuleRegistry::load(temp_dir.path().join("absent.yaml"), &StepRegistry::builtin())
            .unwrap_err();
        assert!(matches!(err, bugbridge::BridgeError::Config(_)));
    }

    #[tokio::test]
    async fn test_replaced_registry_applies_to_next_event() {
        let h = Harness::new(vec![rule("devtest")]);
        let request = request(ticket(1, "[addons]"), EventTarget::Bug, vec![]);

        let before = h.deliver(request.clone()).await;
        assert!(matches!(before, Disposition::Ignored(_)));

        let handle: &RegistryHandle = h.bridge.registry();
        handle.replace(
            RuleRegistry::from_config(
                &bugbridge::config::BridgeConfig {
                    rules: vec![rule("addons")],
                },
                &StepRegistry::builtin(),
            )
            .unwrap(),
        );

        let after = h.deliver(request).await;
        assert!(matches!(after, Disposition::Processed { .. }));
    }
}
