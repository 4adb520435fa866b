//! Thread simulation.
//!
//! Threading rules:
//! - a thread is the set of messages sharing a `thread_id`
//! - replies stay in their parent's thread
//! - forwards start a new thread, since they bring the conversation to a new
//!   audience that may grow its own reply chain
//! - an inclusive message is a leaf: no other message names it as parent
//! - every inclusive message carries the full quoted history of its branch

pub mod settings;

use chrono::{Duration, Local, NaiveDateTime};
use log::{debug, info};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::content::{ContentProvider, EmailPrompt, fallback};
use crate::domain::email::{Message, MessageKind, ThreadId};
use crate::domain::persona::{Persona, display_email, parse_display};

pub use settings::{ActionWeights, SimulationSettings};

const FREE_EMAIL_DOMAINS: &[&str] = &["gmail.com", "yahoo.com", "hotmail.com"];

const SUBJECT_SUFFIXES: &[&str] = &[
    "- Follow Up",
    "- Continued",
    "- Revisited",
    "- Additional Thoughts",
    "- Part II",
];

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("roster needs at least 2 personas, found {found}")]
    RosterTooSmall { found: usize },

    #[error("target inclusive count must be at least 1")]
    ZeroTarget,

    #[error("invalid simulation settings: {0}")]
    InvalidSettings(String),

    #[error("message {0} does not belong to this simulation")]
    UnknownMessage(String),

    #[error("no roster persona outside thread {thread_id} to forward to")]
    NoForwardRecipients { thread_id: ThreadId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reply,
    Forward,
    Nothing,
}

const ACTIONS: [Action; 3] = [Action::Reply, Action::Forward, Action::Nothing];

/// Owns one conversation graph and every piece of mutable simulation state.
///
/// Independent runs need independent simulators; nothing here is shared.
pub struct ThreadSimulator {
    roster: Vec<Persona>,
    topic: Option<String>,
    provider: Option<Arc<dyn ContentProvider>>,
    settings: SimulationSettings,
    action_dist: WeightedIndex<f64>,
    rng: StdRng,

    clock: NaiveDateTime,
    messages: Vec<Message>,
    by_message_id: HashMap<String, usize>,
    threads: HashMap<ThreadId, Vec<usize>>,
    thread_order: Vec<ThreadId>,
    /// message_ids that are the parent of some message (replied to or forwarded)
    replied: HashSet<String>,
    used_subjects: Vec<String>,
}

impl ThreadSimulator {
    pub fn new(roster: Vec<Persona>, settings: SimulationSettings) -> Result<Self, SimulationError> {
        // personas are identified by email address
        let distinct = roster
            .iter()
            .map(|p| p.email.as_str())
            .collect::<HashSet<_>>()
            .len();
        if distinct < 2 {
            return Err(SimulationError::RosterTooSmall { found: distinct });
        }
        settings.validate()?;
        let action_dist = WeightedIndex::new(settings.weights.as_array())
            .map_err(|e| SimulationError::InvalidSettings(e.to_string()))?;

        Ok(Self {
            roster,
            topic: None,
            provider: None,
            settings,
            action_dist,
            rng: StdRng::from_entropy(),
            clock: Local::now().naive_local() - Duration::days(30),
            messages: Vec::new(),
            by_message_id: HashMap::new(),
            threads: HashMap::new(),
            thread_order: Vec::new(),
            replied: HashSet::new(),
            used_subjects: Vec::new(),
        })
    }

    pub fn with_topic(mut self, topic: Option<String>) -> Self {
        self.topic = topic.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_provider(mut self, provider: Option<Arc<dyn ContentProvider>>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_start_date(mut self, start: NaiveDateTime) -> Self {
        self.clock = start;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn used_subjects(&self) -> &[String] {
        &self.used_subjects
    }

    /// Current virtual time (the date of the latest message once any exist).
    pub fn now(&self) -> NaiveDateTime {
        self.clock
    }

    /// Thread ids in creation order.
    pub fn thread_ids(&self) -> &[ThreadId] {
        &self.thread_order
    }

    /// Messages of one thread in creation order.
    pub fn thread(&self, thread_id: &str) -> Vec<&Message> {
        self.threads
            .get(thread_id)
            .map(|idxs| idxs.iter().map(|&i| &self.messages[i]).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.by_message_id.get(message_id).map(|&i| &self.messages[i])
    }

    pub fn has_reply(&self, message_id: &str) -> bool {
        self.replied.contains(message_id)
    }

    pub fn is_inclusive(&self, message: &Message) -> bool {
        !self.replied.contains(&message.message_id)
    }

    /// Number of leaf messages.
    pub fn inclusive_count(&self) -> usize {
        self.messages.len() - self.replied.len()
    }

    pub fn inclusive_messages(&self) -> Vec<&Message> {
        self.messages.iter().filter(|m| self.is_inclusive(m)).collect()
    }

    /// Roster members that have not yet sent or received anything in the thread.
    pub fn available_recipients(&self, thread_id: &str) -> Vec<&Persona> {
        let present = self.thread_participant_emails(thread_id);
        self.roster
            .iter()
            .filter(|p| !present.contains(&p.email))
            .collect()
    }

    pub fn can_forward(&self, thread_id: &str) -> bool {
        !self.available_recipients(thread_id).is_empty()
    }

    /// Most recent message in the thread without a reply.
    pub fn open_tip(&self, thread_id: &str) -> Option<&Message> {
        self.threads.get(thread_id)?.iter().rev().find_map(|&i| {
            let m = &self.messages[i];
            (!self.has_reply(&m.message_id)).then_some(m)
        })
    }

    /// Start a new thread with a fresh message.
    pub fn create_root(&mut self) -> Result<&Message, SimulationError> {
        let sender = self
            .roster
            .choose(&mut self.rng)
            .cloned()
            .ok_or(SimulationError::RosterTooSmall { found: 0 })?;
        let others: Vec<Persona> = self
            .roster
            .iter()
            .filter(|p| p.email != sender.email)
            .cloned()
            .collect();
        if others.is_empty() {
            return Err(SimulationError::RosterTooSmall {
                found: self.roster.len(),
            });
        }
        let k = self.rng.gen_range(1..=3).min(others.len());
        let recipients: Vec<Persona> = others.choose_multiple(&mut self.rng, k).cloned().collect();

        let generated = self.provider.as_ref().and_then(|p| {
            p.generate_email(&EmailPrompt {
                sender: &sender,
                recipients: &recipients,
                topic: self.topic.as_deref().unwrap_or("General check-in"),
                context: None,
                used_subjects: &self.used_subjects,
            })
        });

        let (mut subject, body) = match generated.filter(|g| g.has_body()) {
            Some(g) => {
                let subject = match g.subject.filter(|s| !s.trim().is_empty()) {
                    Some(s) => s,
                    None => fallback::root_email(&mut self.rng, self.topic.as_deref()).0,
                };
                (subject, g.body)
            }
            None => fallback::root_email(&mut self.rng, self.topic.as_deref()),
        };

        if self.used_subjects.contains(&subject) {
            let suffix = SUBJECT_SUFFIXES.choose(&mut self.rng).unwrap_or(&"- Continued");
            subject = format!("{subject} {suffix}");
        }
        self.used_subjects.push(subject.clone());

        let thread_id = self.new_uuid().to_string();
        let message = self.build_message(
            sender.display(),
            recipients.iter().map(Persona::display).collect(),
            subject,
            body,
            MessageKind::New,
            thread_id,
            None,
        );
        Ok(self.store(message))
    }

    /// Reply within the parent's thread, quoting the parent's full body.
    pub fn reply_to(&mut self, parent: &Message) -> Result<&Message, SimulationError> {
        self.ensure_known(parent)?;

        let parent_recipients: Vec<_> = parent.recipients.iter().map(|r| parse_display(r)).collect();
        let parent_sender = parse_display(&parent.sender);

        let sender_info = parent_recipients
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| parent_sender.clone());
        let sender = self
            .find_persona(&sender_info.email)
            .cloned()
            .unwrap_or_else(|| Persona::new(&sender_info.name, &sender_info.email, "Employee", "General"));

        let to = self
            .find_persona(&parent_sender.email)
            .cloned()
            .unwrap_or_else(|| Persona::from_display(&parent.sender));

        let cc: Vec<String> = if self.settings.reply_all && parent_recipients.len() > 1 {
            parent_recipients
                .iter()
                .filter(|r| r.email != sender_info.email)
                .map(|r| format!("{} <{}>", r.name, r.email))
                .collect()
        } else {
            Vec::new()
        };

        let subject = if parent.subject.to_lowercase().starts_with("re:") {
            parent.subject.clone()
        } else {
            format!("Re: {}", parent.subject)
        };

        let topic = self.topic.clone().unwrap_or_else(|| parent.subject.clone());
        let new_body = self
            .provider
            .as_ref()
            .and_then(|p| {
                p.generate_email(&EmailPrompt {
                    sender: &sender,
                    recipients: std::slice::from_ref(&to),
                    topic: &topic,
                    context: Some(&parent.body),
                    used_subjects: &[],
                })
            })
            .filter(|g| g.has_body())
            .map(|g| g.body)
            .unwrap_or_else(|| fallback::reply_body(&mut self.rng, self.topic.as_deref()));

        let quoted: Vec<String> = parent.body.split('\n').map(|l| format!("> {l}")).collect();
        let body = format!(
            "{new_body}\n\nOn {}, {} wrote:\n{}",
            parent.date.format("%Y-%m-%d %H:%M"),
            parent.sender,
            quoted.join("\n")
        );

        let mut message = self.build_message(
            sender.display(),
            vec![to.display()],
            subject,
            body,
            MessageKind::Reply,
            parent.thread_id.clone(),
            Some(parent),
        );
        message.cc = cc;
        Ok(self.store(message))
    }

    /// Forward the parent to someone new. The forward opens its own thread.
    pub fn forward(&mut self, parent: &Message) -> Result<&Message, SimulationError> {
        self.ensure_known(parent)?;

        let present = self.thread_participant_emails(&parent.thread_id);
        let candidates: Vec<Persona> = self
            .roster
            .iter()
            .filter(|p| !present.contains(&p.email))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(SimulationError::NoForwardRecipients {
                thread_id: parent.thread_id.clone(),
            });
        }

        let participants: Vec<Persona> = self
            .roster
            .iter()
            .filter(|p| present.contains(&p.email))
            .cloned()
            .collect();
        let sender = match participants.choose(&mut self.rng) {
            Some(p) => p.clone(),
            None => self
                .roster
                .choose(&mut self.rng)
                .cloned()
                .ok_or(SimulationError::RosterTooSmall { found: 0 })?,
        };
        let recipients: Vec<Persona> = candidates.choose(&mut self.rng).cloned().into_iter().collect();

        let subject = if parent.subject.to_lowercase().starts_with("fwd:") {
            parent.subject.clone()
        } else {
            format!("Fwd: {}", parent.subject)
        };

        let topic = format!(
            "Forwarding: {}",
            self.topic.as_deref().unwrap_or(&parent.subject)
        );
        let new_body = self
            .provider
            .as_ref()
            .and_then(|p| {
                p.generate_email(&EmailPrompt {
                    sender: &sender,
                    recipients: &recipients,
                    topic: &topic,
                    context: Some(&parent.body),
                    used_subjects: &[],
                })
            })
            .filter(|g| g.has_body())
            .map(|g| g.body)
            .unwrap_or_else(|| fallback::forward_body(&mut self.rng, self.topic.as_deref()));

        let forward_block = format!(
            "---------- Forwarded message ----------\nFrom: {}\nDate: {}\nSubject: {}\nTo: {}\n\n{}",
            parent.sender,
            parent.date.format("%Y-%m-%d %H:%M:%S"),
            parent.subject,
            parent.recipients.join(", "),
            parent.body
        );
        let body = format!("{new_body}\n\n{forward_block}");

        let thread_id = self.new_uuid().to_string();
        let mut message = self.build_message(
            sender.display(),
            recipients.iter().map(Persona::display).collect(),
            subject,
            body,
            MessageKind::Forward,
            thread_id,
            Some(parent),
        );
        message.attachments = parent.attachments.clone();
        Ok(self.store(message))
    }

    /// Grow threads until at least `target_inclusive` leaf messages exist.
    pub fn simulate(&mut self, target_inclusive: usize) -> Result<(), SimulationError> {
        if target_inclusive == 0 {
            return Err(SimulationError::ZeroTarget);
        }
        info!("Simulation started. Target: {target_inclusive} inclusive emails.");

        while self.inclusive_count() < target_inclusive {
            let tid = self.create_root()?.thread_id.clone();
            let target_len = self.rng.gen_range(2..=self.settings.max_emails_per_thread);
            let mut idle = 0;

            while self.inclusive_count() < target_inclusive && self.thread_len(&tid) < target_len {
                if self.thread_len(&tid) >= 2 && self.rng.gen_bool(self.settings.early_end_chance) {
                    debug!("Thread {tid} ended early");
                    break;
                }

                let Some(tip) = self.open_tip(&tid).cloned() else {
                    break;
                };

                match self.choose_action(&tid) {
                    Action::Reply => {
                        self.reply_to(&tip)?;
                        idle = 0;
                    }
                    Action::Forward => {
                        self.forward(&tip)?;
                        idle = 0;
                    }
                    Action::Nothing => {
                        idle += 1;
                        if idle >= self.settings.max_idle_ticks {
                            debug!("Thread {tid} went idle");
                            break;
                        }
                    }
                }
            }
        }

        info!("Simulation complete.");
        Ok(())
    }

    /// Weighted draw, with forward downgraded to reply when nobody new is left.
    fn choose_action(&mut self, thread_id: &str) -> Action {
        let action = ACTIONS[self.action_dist.sample(&mut self.rng)];
        if action == Action::Forward && !self.can_forward(thread_id) {
            Action::Reply
        } else {
            action
        }
    }

    fn thread_len(&self, thread_id: &str) -> usize {
        self.threads.get(thread_id).map_or(0, Vec::len)
    }

    fn thread_participant_emails(&self, thread_id: &str) -> HashSet<String> {
        let mut emails = HashSet::new();
        for m in self.thread(thread_id) {
            emails.insert(display_email(&m.sender));
            emails.extend(m.recipients.iter().map(|r| display_email(r)));
        }
        emails
    }

    fn find_persona(&self, email: &str) -> Option<&Persona> {
        self.roster.iter().find(|p| p.email == email)
    }

    fn ensure_known(&self, parent: &Message) -> Result<(), SimulationError> {
        if self.by_message_id.contains_key(&parent.message_id) {
            Ok(())
        } else {
            Err(SimulationError::UnknownMessage(parent.message_id.clone()))
        }
    }

    fn new_uuid(&mut self) -> Uuid {
        uuid::Builder::from_random_bytes(self.rng.r#gen()).into_uuid()
    }

    /// Advance the virtual clock by 1-120 minutes.
    fn tick(&mut self) -> NaiveDateTime {
        self.clock += Duration::minutes(self.rng.gen_range(1..=120));
        self.clock
    }

    #[allow(clippy::too_many_arguments)]
    fn build_message(
        &mut self,
        sender: String,
        recipients: Vec<String>,
        subject: String,
        body: String,
        kind: MessageKind,
        thread_id: ThreadId,
        parent: Option<&Message>,
    ) -> Message {
        let id = self.new_uuid();
        let domain = FREE_EMAIL_DOMAINS.choose(&mut self.rng).unwrap_or(&"gmail.com");
        let references = parent
            .map(|p| {
                let mut refs = p.references.clone();
                refs.push(p.message_id.clone());
                refs
            })
            .unwrap_or_default();

        Message {
            id,
            message_id: format!("<{id}@{domain}>"),
            thread_id,
            parent_id: parent.map(|p| p.message_id.clone()),
            sender,
            recipients,
            cc: Vec::new(),
            subject,
            body,
            date: self.tick(),
            kind,
            references,
            attachments: Vec::new(),
        }
    }

    fn store(&mut self, message: Message) -> &Message {
        let idx = self.messages.len();
        if let Some(parent_id) = &message.parent_id {
            self.replied.insert(parent_id.clone());
        }
        if !self.threads.contains_key(&message.thread_id) {
            self.thread_order.push(message.thread_id.clone());
        }
        self.threads
            .entry(message.thread_id.clone())
            .or_default()
            .push(idx);
        self.by_message_id.insert(message.message_id.clone(), idx);
        self.messages.push(message);

        info!(
            "  [Progress] Total emails: {} | Inclusive emails: {}",
            self.messages.len(),
            self.inclusive_count()
        );
        &self.messages[idx]
    }
}

#[cfg(test)]
mod tests;
