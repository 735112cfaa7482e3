//! Per-user admin dialogues.
//!
//! The add-movie wizard walks `AwaitName → AwaitDescription → AwaitFile →
//! AwaitGenre → AwaitPremium` and commits on the last answer. Each state carries
//! exactly the fields collected so far. Invalid input abandons the dialogue.
//!
//! State lives only in memory: a restart drops every dialogue in flight.
//! Two messages from the same user racing on one step resolve as last write wins.

use dashmap::DashMap;
use teloxide::types::Message;

use crate::core::error::{AppError, AppResult};
use crate::storage::catalog::{MediaKind, NewMovie};
use crate::storage::db::NewsKind;

/// Answers to the premium question that count as "yes".
const AFFIRMATIVE: &[&str] = &["ha", "yes", "y"];

/// A media reference captured at the file step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub file_id: String,
    pub kind: MediaKind,
}

/// States of the add-movie wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddMovieState {
    AwaitName,
    AwaitDescription {
        name: String,
    },
    AwaitFile {
        name: String,
        description: String,
    },
    AwaitGenre {
        name: String,
        description: String,
        media: MediaRef,
    },
    AwaitPremium {
        name: String,
        description: String,
        media: MediaRef,
        genre: String,
    },
}

/// A dialogue in progress for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    AddMovie(AddMovieState),
    /// Waiting for a `kind|caption|content` line after `/news_add`
    AwaitNews,
}

/// What the user sent, reduced to what the wizard cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardInput {
    Text(String),
    Media(MediaRef),
    /// Stickers, locations, polls and anything else without a usable payload
    Unsupported,
}

/// Why a dialogue was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    ExpectedText,
    ExpectedMedia,
}

/// Result of feeding one input to the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Keep the new state and ask the next question
    Next(AddMovieState),
    /// Persist the movie; the dialogue is over either way
    Commit(NewMovie),
    /// Drop the dialogue and tell the user why
    Abort(AbortReason),
}

/// `true` for "ha", "yes" or "y" in any case, ignoring surrounding whitespace.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    AFFIRMATIVE.contains(&answer.as_str())
}

impl AddMovieState {
    /// Advances the wizard by one step.
    ///
    /// The premium step never aborts: anything that is not an affirmative text
    /// answer (including media) commits the movie as non-premium.
    pub fn advance(self, input: WizardInput, creator_id: i64) -> Transition {
        match (self, input) {
            (AddMovieState::AwaitName, WizardInput::Text(text)) => {
                let name = text.trim();
                if name.is_empty() {
                    Transition::Abort(AbortReason::ExpectedText)
                } else {
                    Transition::Next(AddMovieState::AwaitDescription { name: name.to_string() })
                }
            }
            (AddMovieState::AwaitDescription { name }, WizardInput::Text(description)) => {
                Transition::Next(AddMovieState::AwaitFile {
                    name,
                    description: description.trim().to_string(),
                })
            }
            (AddMovieState::AwaitFile { name, description }, WizardInput::Media(media)) => {
                Transition::Next(AddMovieState::AwaitGenre {
                    name,
                    description,
                    media,
                })
            }
            (AddMovieState::AwaitFile { .. }, _) => Transition::Abort(AbortReason::ExpectedMedia),
            (
                AddMovieState::AwaitGenre {
                    name,
                    description,
                    media,
                },
                WizardInput::Text(genre),
            ) => Transition::Next(AddMovieState::AwaitPremium {
                name,
                description,
                media,
                genre: genre.trim().to_string(),
            }),
            (
                AddMovieState::AwaitPremium {
                    name,
                    description,
                    media,
                    genre,
                },
                input,
            ) => {
                let premium = matches!(&input, WizardInput::Text(answer) if is_affirmative(answer));
                Transition::Commit(NewMovie {
                    name,
                    description,
                    file_id: media.file_id,
                    media_kind: media.kind,
                    genre,
                    premium,
                    added_by: creator_id,
                })
            }
            (_, _) => Transition::Abort(AbortReason::ExpectedText),
        }
    }

    /// Locale key of the question asked in this state.
    pub fn prompt_key(&self) -> &'static str {
        match self {
            AddMovieState::AwaitName => "wizard-ask-name",
            AddMovieState::AwaitDescription { .. } => "wizard-ask-description",
            AddMovieState::AwaitFile { .. } => "wizard-ask-file",
            AddMovieState::AwaitGenre { .. } => "wizard-ask-genre",
            AddMovieState::AwaitPremium { .. } => "wizard-ask-premium",
        }
    }
}

impl AbortReason {
    pub fn message_key(self) -> &'static str {
        match self {
            AbortReason::ExpectedText => "wizard-aborted-text",
            AbortReason::ExpectedMedia => "wizard-aborted-media",
        }
    }
}

/// A parsed `/news_add` answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsDraft {
    pub kind: NewsKind,
    pub caption: String,
    pub content: String,
}

/// Parses `kind|caption|content`. The content may itself contain `|`.
pub fn parse_news_line(line: &str) -> AppResult<NewsDraft> {
    let mut parts = line.splitn(3, '|').map(str::trim);
    let (Some(kind), Some(caption), Some(content)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AppError::Validation("expected kind|caption|content".to_string()));
    };

    let kind: NewsKind = kind
        .parse()
        .map_err(|_| AppError::Validation(format!("unknown news kind: {}", kind)))?;
    if content.is_empty() {
        return Err(AppError::Validation("news content is empty".to_string()));
    }

    Ok(NewsDraft {
        kind,
        caption: caption.to_string(),
        content: content.to_string(),
    })
}

/// Extracts the wizard-relevant payload of a Telegram message.
///
/// For photos the largest variant is taken.
pub fn wizard_input(msg: &Message) -> WizardInput {
    let media = |file_id: &str, kind: MediaKind| {
        WizardInput::Media(MediaRef {
            file_id: file_id.to_string(),
            kind,
        })
    };

    if let Some(video) = msg.video() {
        media(&video.file.id.0, MediaKind::Video)
    } else if let Some(animation) = msg.animation() {
        media(&animation.file.id.0, MediaKind::Animation)
    } else if let Some(document) = msg.document() {
        media(&document.file.id.0, MediaKind::Document)
    } else if let Some(audio) = msg.audio() {
        media(&audio.file.id.0, MediaKind::Audio)
    } else if let Some(photo) = msg.photo().and_then(|sizes| sizes.iter().max_by_key(|p| p.width * p.height)) {
        media(&photo.file.id.0, MediaKind::Photo)
    } else if let Some(text) = msg.text() {
        WizardInput::Text(text.to_string())
    } else {
        WizardInput::Unsupported
    }
}

/// Dialogues keyed by Telegram user id. One per user; starting a new one
/// silently replaces the old.
#[derive(Debug, Default)]
pub struct ConversationStore {
    inner: DashMap<i64, Conversation>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the add-movie wizard.
    pub fn start_add_movie(&self, user_id: i64) -> AddMovieState {
        self.inner.insert(user_id, Conversation::AddMovie(AddMovieState::AwaitName));
        AddMovieState::AwaitName
    }

    pub fn start_news(&self, user_id: i64) {
        self.inner.insert(user_id, Conversation::AwaitNews);
    }

    pub fn is_active(&self, user_id: i64) -> bool {
        self.inner.contains_key(&user_id)
    }

    /// Removes and returns the user's dialogue.
    pub fn take(&self, user_id: i64) -> Option<Conversation> {
        self.inner.remove(&user_id).map(|(_, conversation)| conversation)
    }

    pub fn put(&self, user_id: i64, conversation: Conversation) {
        self.inner.insert(user_id, conversation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> WizardInput {
        WizardInput::Text(s.to_string())
    }

    fn video(id: &str) -> WizardInput {
        WizardInput::Media(MediaRef {
            file_id: id.to_string(),
            kind: MediaKind::Video,
        })
    }

    fn run(inputs: Vec<WizardInput>) -> Transition {
        let mut state = AddMovieState::AwaitName;
        let mut inputs = inputs.into_iter().peekable();
        while let Some(input) = inputs.next() {
            match state.advance(input, 42) {
                Transition::Next(next) if inputs.peek().is_some() => state = next,
                other => return other,
            }
        }
        Transition::Next(state)
    }

    #[test]
    fn test_full_wizard_with_ha_commits_premium() {
        let outcome = run(vec![text("Film A"), text("d"), video("BAAC-file"), text("drama"), text("ha")]);
        assert_eq!(
            outcome,
            Transition::Commit(NewMovie {
                name: "Film A".to_string(),
                description: "d".to_string(),
                file_id: "BAAC-file".to_string(),
                media_kind: MediaKind::Video,
                genre: "drama".to_string(),
                premium: true,
                added_by: 42,
            })
        );
    }

    #[test]
    fn test_text_answers_are_trimmed() {
        match run(vec![text("  Film A "), text("\n  A heist.  \n"), video("f"), text(" drama "), text("no")]) {
            Transition::Commit(movie) => {
                assert_eq!(movie.name, "Film A");
                assert_eq!(movie.description, "A heist.");
                assert_eq!(movie.genre, "drama");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_yoq_commits_non_premium() {
        match run(vec![text("Film A"), text("d"), video("f"), text("drama"), text("yoq")]) {
            Transition::Commit(movie) => assert!(!movie.premium),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_premium_step_treats_media_as_no() {
        match run(vec![text("A"), text("d"), video("f"), text("g"), video("other")]) {
            Transition::Commit(movie) => assert!(!movie.premium),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_media_aborts_at_file_step() {
        assert_eq!(
            run(vec![text("A"), text("d"), WizardInput::Unsupported]),
            Transition::Abort(AbortReason::ExpectedMedia)
        );
        assert_eq!(
            run(vec![text("A"), text("d"), text("not a file")]),
            Transition::Abort(AbortReason::ExpectedMedia)
        );
    }

    #[test]
    fn test_blank_name_aborts() {
        assert_eq!(run(vec![text("   ")]), Transition::Abort(AbortReason::ExpectedText));
        assert_eq!(run(vec![video("f")]), Transition::Abort(AbortReason::ExpectedText));
    }

    #[test]
    fn test_media_where_text_expected_aborts() {
        assert_eq!(
            run(vec![text("A"), video("f")]),
            Transition::Abort(AbortReason::ExpectedText)
        );
        assert_eq!(
            run(vec![text("A"), text("d"), video("f"), WizardInput::Unsupported]),
            Transition::Abort(AbortReason::ExpectedText)
        );
    }

    #[test]
    fn test_prompts_follow_states() {
        let state = AddMovieState::AwaitName;
        assert_eq!(state.prompt_key(), "wizard-ask-name");
        let Transition::Next(state) = state.advance(text("A"), 1) else {
            panic!("expected next state");
        };
        assert_eq!(state.prompt_key(), "wizard-ask-description");
    }

    #[test]
    fn test_affirmative_tokens() {
        for yes in ["ha", "HA", " Yes ", "y", "Y"] {
            assert!(is_affirmative(yes), "{}", yes);
        }
        for no in ["yoq", "yo'q", "no", "", "hay", "yes!"] {
            assert!(!is_affirmative(no), "{}", no);
        }
    }

    #[test]
    fn test_parse_news_line() {
        let draft = parse_news_line("photo| New poster |AgACAgI|extra").unwrap();
        assert_eq!(draft.kind, NewsKind::Photo);
        assert_eq!(draft.caption, "New poster");
        assert_eq!(draft.content, "AgACAgI|extra");

        assert!(parse_news_line("text|only two").is_err());
        assert!(parse_news_line("audio|c|x").is_err());
        assert!(parse_news_line("text|c|  ").is_err());
    }

    #[test]
    fn test_store_overwrites_and_takes() {
        let store = ConversationStore::new();
        assert!(!store.is_active(7));

        store.start_news(7);
        store.start_add_movie(7);
        assert!(store.is_active(7));
        assert_eq!(store.take(7), Some(Conversation::AddMovie(AddMovieState::AwaitName)));

        assert!(!store.is_active(7));
        assert!(store.take(7).is_none());
    }
}
