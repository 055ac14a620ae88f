//! Per-comment dispatch: summon phrases → responders → one reply.
//!
//! Every registered phrase found in a comment contributes one block, in
//! registration order. Within a block the per-term segments are joined with
//! [`REPLY_SEPARATOR`]. Appendices of rated responders and the footer go at
//! the end. Comments that summon nobody get no reply.

use crate::command::CommandParser;
use crate::compose::{REPLY_SEPARATOR, usage_reply};
use crate::error::{CommandError, ConfigError, ConfigResult, TransportError, TransportResult};
use crate::responder::Responder;
use crate::transport::{Comment, ForumTransport};

/// A fault raised while handling a comment, tagged with the comment it came
/// from so the scheduler can mark it handled.
#[derive(Debug)]
pub struct Fault {
    /// `None` when the stream itself failed.
    pub comment_id: Option<String>,
    pub error: TransportError,
}

impl Fault {
    pub fn on_comment(comment_id: &str, error: TransportError) -> Self {
        Self {
            comment_id: Some(comment_id.to_string()),
            error,
        }
    }

    pub fn on_stream(error: TransportError) -> Self {
        Self {
            comment_id: None,
            error,
        }
    }

    /// The collaborator's text payload, as classified by the scheduler.
    pub fn text(&self) -> String {
        self.error.to_string()
    }
}

/// What happened to one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Written by the bot itself.
    OwnComment,
    AlreadyHandled,
    /// No summon phrase present.
    NotSummoned,
    Replied,
}

struct Registration {
    parser: CommandParser,
    responder: Box<dyn Responder>,
}

/// Routes comments to responders in registration order.
pub struct Dispatcher {
    registrations: Vec<Registration>,
    footer: Option<String>,
}

impl Dispatcher {
    /// Register `responders`. Phrases must be non-empty and unique ignoring
    /// case.
    pub fn new(responders: Vec<Box<dyn Responder>>, footer: Option<String>) -> ConfigResult<Self> {
        let phrases: Vec<String> = responders.iter().map(|r| r.phrase().to_string()).collect();
        for (i, phrase) in phrases.iter().enumerate() {
            if phrases[..i].iter().any(|p| p.eq_ignore_ascii_case(phrase)) {
                return Err(ConfigError::Invalid {
                    message: format!("summon phrase {phrase:?} is registered twice"),
                });
            }
        }

        let registrations = responders
            .into_iter()
            .map(|responder| {
                let parser =
                    CommandParser::new(responder.phrase(), phrases.iter().map(String::as_str))?;
                Ok(Registration { parser, responder })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            registrations,
            footer,
        })
    }

    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.parser.phrase())
    }

    /// Build the full reply for a comment body, or `None` if nothing was
    /// summoned. Probing detail pages may fail; that is the only error.
    pub fn compose_reply(&self, body: &str) -> TransportResult<Option<String>> {
        let mut blocks: Vec<String> = Vec::new();
        let mut appendices: Vec<&str> = Vec::new();

        for reg in &self.registrations {
            let phrase = reg.parser.phrase();
            let terms = match reg.parser.terms(body) {
                Ok(terms) if terms.is_empty() => continue,
                Ok(terms) => terms,
                Err(CommandError::MissingArgument { .. }) => {
                    tracing::info!(phrase, "summoned without a search term");
                    blocks.push(usage_reply(reg.responder.usage()));
                    continue;
                }
            };

            let mut segments = Vec::with_capacity(terms.len());
            let mut rated = false;
            for term in &terms {
                tracing::debug!(phrase, query = %term, "looking up term");
                let segment = reg.responder.respond(term)?;
                rated |= segment.rated;
                segments.push(segment.body);
            }
            blocks.push(segments.join(REPLY_SEPARATOR));

            if rated {
                if let Some(appendix) = reg.responder.appendix() {
                    if !appendices.contains(&appendix) {
                        appendices.push(appendix);
                    }
                }
            }
        }

        if blocks.is_empty() {
            return Ok(None);
        }

        let mut reply = blocks.join("\n\n");
        for appendix in appendices {
            reply.push_str("\n\n");
            reply.push_str(appendix);
        }
        if let Some(footer) = &self.footer {
            reply.push_str(REPLY_SEPARATOR);
            reply.push_str(footer);
        }
        Ok(Some(reply))
    }

    /// Handle one comment end to end: skip, or reply and mark handled.
    pub fn handle(
        &self,
        comment: &Comment,
        transport: &mut dyn ForumTransport,
    ) -> Result<Outcome, Fault> {
        if comment.author.eq_ignore_ascii_case(transport.identity()) {
            return Ok(Outcome::OwnComment);
        }
        if comment.handled {
            return Ok(Outcome::AlreadyHandled);
        }

        let reply = self
            .compose_reply(&comment.body)
            .map_err(|e| Fault::on_comment(&comment.id, e))?;
        let Some(reply) = reply else {
            return Ok(Outcome::NotSummoned);
        };

        transport
            .reply(&comment.id, &reply)
            .map_err(|e| Fault::on_comment(&comment.id, e))?;

        // The marker is advisory: the reply already went out.
        if let Err(e) = transport.mark_handled(&comment.id) {
            tracing::warn!(comment_id = %comment.id, error = %e, "failed to mark comment handled");
        }
        tracing::info!(comment_id = %comment.id, "comment posted");
        Ok(Outcome::Replied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::Segment;
    use crate::transport::MockTransport;

    /// Echoes the term; rated when the term starts with a digit.
    struct Echo {
        phrase: &'static str,
        appendix: Option<&'static str>,
    }

    impl Responder for Echo {
        fn phrase(&self) -> &str {
            self.phrase
        }

        fn usage(&self) -> &str {
            "echo usage"
        }

        fn respond(&self, term: &str) -> TransportResult<Segment> {
            if term == "boom" {
                return Err(TransportError::Http {
                    url: "https://detail.test".into(),
                    message: "down".into(),
                });
            }
            Ok(Segment {
                body: format!("<{}:{term}>", self.phrase),
                rated: term.starts_with(|c: char| c.is_ascii_digit()),
            })
        }

        fn appendix(&self) -> Option<&str> {
            self.appendix
        }
    }

    fn dispatcher(footer: Option<&str>) -> Dispatcher {
        Dispatcher::new(
            vec![
                Box::new(Echo {
                    phrase: "CPUBot!",
                    appendix: Some("DISCLAIMER"),
                }),
                Box::new(Echo {
                    phrase: "GPUBot!",
                    appendix: Some("DISCLAIMER"),
                }),
                Box::new(Echo {
                    phrase: "WikiBot!",
                    appendix: None,
                }),
            ],
            footer.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn blocks_follow_registration_order() {
        let reply = dispatcher(None)
            .compose_reply("WikiBot! Okami\nGPUBot! gtx, rx\nCPUBot! i7")
            .unwrap()
            .unwrap();
        assert_eq!(
            reply,
            "<CPUBot!:i7>\n\n<GPUBot!:gtx>\n\n---\n\n<GPUBot!:rx>\n\n<WikiBot!:Okami>"
        );
    }

    #[test]
    fn appendix_once_when_rated_then_footer() {
        let reply = dispatcher(Some("FOOTER"))
            .compose_reply("CPUBot! 3600\nGPUBot! 1080")
            .unwrap()
            .unwrap();
        assert_eq!(reply.matches("DISCLAIMER").count(), 1);
        assert!(reply.ends_with("DISCLAIMER\n\n---\n\nFOOTER"));
    }

    #[test]
    fn no_appendix_without_rating() {
        let reply = dispatcher(None).compose_reply("CPUBot! intel").unwrap().unwrap();
        assert!(!reply.contains("DISCLAIMER"));
    }

    #[test]
    fn unsummoned_comment_has_no_reply() {
        assert_eq!(dispatcher(Some("FOOTER")).compose_reply("nice build").unwrap(), None);
    }

    #[test]
    fn missing_argument_gets_usage_reply() {
        let reply = dispatcher(None).compose_reply("CPUBot!").unwrap().unwrap();
        assert_eq!(reply, "I need a search term to work with! Please try `echo usage`");
    }

    #[test]
    fn duplicate_phrases_are_rejected() {
        let result = Dispatcher::new(
            vec![
                Box::new(Echo {
                    phrase: "CPUBot!",
                    appendix: None,
                }),
                Box::new(Echo {
                    phrase: "cpubot!",
                    appendix: None,
                }),
            ],
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn handle_replies_and_marks() {
        let mut transport = MockTransport::new("helper-bot");
        let comment = Comment::new("c1", "alice", "CPUBot! i7");
        let outcome = dispatcher(None).handle(&comment, &mut transport).unwrap();
        assert_eq!(outcome, Outcome::Replied);
        assert_eq!(transport.replies()[0].0, "c1");
        assert!(transport.is_handled("c1"));
    }

    #[test]
    fn handle_skips_own_and_handled_comments() {
        let mut transport = MockTransport::new("helper-bot");
        let d = dispatcher(None);

        let own = Comment::new("c1", "Helper-Bot", "CPUBot! i7");
        assert_eq!(d.handle(&own, &mut transport).unwrap(), Outcome::OwnComment);

        let mut done = Comment::new("c2", "alice", "CPUBot! i7");
        done.handled = true;
        assert_eq!(d.handle(&done, &mut transport).unwrap(), Outcome::AlreadyHandled);

        let quiet = Comment::new("c3", "alice", "hello");
        assert_eq!(d.handle(&quiet, &mut transport).unwrap(), Outcome::NotSummoned);

        assert!(transport.replies().is_empty());
        assert!(transport.handled().is_empty());
    }

    #[test]
    fn faults_carry_comment_id() {
        let mut transport = MockTransport::new("helper-bot");
        let comment = Comment::new("c9", "alice", "CPUBot! boom");
        let fault = dispatcher(None).handle(&comment, &mut transport).unwrap_err();
        assert_eq!(fault.comment_id.as_deref(), Some("c9"));
        assert!(transport.replies().is_empty());
    }

    #[test]
    fn mark_failure_after_post_is_not_a_fault() {
        let mut transport = MockTransport::new("helper-bot");
        transport.fail_next_mark(TransportError::Http {
            url: "https://oauth.test/api/save".into(),
            message: "503".into(),
        });
        let comment = Comment::new("c1", "alice", "CPUBot! i7");
        let outcome = dispatcher(None).handle(&comment, &mut transport).unwrap();
        assert_eq!(outcome, Outcome::Replied);
        assert!(!transport.is_handled("c1"));
    }
}
