use super::*;
use crate::content::GeneratedEmail;
use crate::domain::email::Attachment;
use chrono::NaiveDate;

fn roster(n: usize) -> Vec<Persona> {
    (0..n)
        .map(|i| {
            Persona::new(
                format!("Person {i}"),
                format!("person{i}@acme.com"),
                "Analyst",
                "Finance",
            )
        })
        .collect()
}

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn sim(n: usize, seed: u64) -> ThreadSimulator {
    ThreadSimulator::new(roster(n), SimulationSettings::default())
        .unwrap()
        .with_seed(seed)
        .with_start_date(start())
}

fn parent_ids(messages: &[Message]) -> HashSet<String> {
    messages.iter().filter_map(|m| m.parent_id.clone()).collect()
}

struct FixedProvider(&'static str);

impl ContentProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    fn complete(&self, _prompt: &str) -> Option<String> {
        Some(self.0.to_string())
    }
}

struct FailingProvider;

impl ContentProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn complete(&self, _prompt: &str) -> Option<String> {
        None
    }

    fn generate_email(&self, _prompt: &EmailPrompt<'_>) -> Option<GeneratedEmail> {
        None
    }
}

#[test]
fn test_single_target_single_root() {
    let mut s = sim(3, 11);
    s.simulate(1).unwrap();

    assert_eq!(s.messages().len(), 1);
    let m = &s.messages()[0];
    assert_eq!(m.kind, MessageKind::New);
    assert!(m.parent_id.is_none());
    assert!(s.is_inclusive(m));
    assert_eq!(s.inclusive_count(), 1);
}

#[test]
fn test_termination_reaches_target() {
    for target in [1, 5, 20] {
        for seed in 0..10 {
            let mut s = sim(8, seed);
            s.simulate(target).unwrap();
            assert!(s.inclusive_count() >= target, "seed {seed} target {target}");
        }
    }
}

#[test]
fn test_inclusive_set_matches_parent_links() {
    let mut s = sim(10, 3);
    s.simulate(20).unwrap();

    let parents = parent_ids(s.messages());
    for m in s.messages() {
        assert_eq!(s.is_inclusive(m), !parents.contains(&m.message_id));
    }
    assert_eq!(s.inclusive_count(), s.messages().len() - parents.len());
    assert_eq!(s.inclusive_messages().len(), s.inclusive_count());
}

#[test]
fn test_clock_is_monotonic_with_bounded_steps() {
    let mut s = sim(6, 5);
    s.simulate(20).unwrap();

    let mut prev = start();
    for m in s.messages() {
        let delta = (m.date - prev).num_minutes();
        assert!((1..=120).contains(&delta), "delta {delta}");
        prev = m.date;
    }
    assert_eq!(s.now(), prev);
}

#[test]
fn test_thread_membership() {
    let settings = SimulationSettings {
        weights: ActionWeights {
            reply: 0.5,
            forward: 0.5,
            nothing: 0.0,
        },
        ..Default::default()
    };
    let mut s = ThreadSimulator::new(roster(12), settings)
        .unwrap()
        .with_seed(9)
        .with_start_date(start());
    s.simulate(20).unwrap();

    let mut saw_forward = false;
    for m in s.messages() {
        let Some(pid) = &m.parent_id else {
            assert_eq!(m.kind, MessageKind::New);
            continue;
        };
        let parent = s.get(pid).unwrap();
        match m.kind {
            MessageKind::Reply => assert_eq!(m.thread_id, parent.thread_id),
            MessageKind::Forward => {
                saw_forward = true;
                assert_ne!(m.thread_id, parent.thread_id);
            }
            MessageKind::New => panic!("root with a parent"),
        }
        let mut expected = parent.references.clone();
        expected.push(parent.message_id.clone());
        assert_eq!(m.references, expected);
    }
    assert!(saw_forward);

    for tid in s.thread_ids() {
        assert!(s.thread(tid).iter().all(|m| &m.thread_id == tid));
    }
}

#[test]
fn test_no_rebranching_during_simulation() {
    for seed in 0..5 {
        let mut s = sim(10, seed);
        s.simulate(20).unwrap();

        let mut children: HashMap<&str, usize> = HashMap::new();
        for m in s.messages() {
            if let Some(pid) = &m.parent_id {
                *children.entry(pid.as_str()).or_default() += 1;
            }
        }
        assert!(children.values().all(|&c| c == 1), "seed {seed}");
    }
}

#[test]
fn test_direct_double_reply_branches() {
    let mut s = sim(5, 21);
    let root = s.create_root().unwrap().clone();
    let a = s.reply_to(&root).unwrap().clone();
    let b = s.reply_to(&root).unwrap().clone();

    assert_eq!(a.thread_id, root.thread_id);
    assert_eq!(b.thread_id, root.thread_id);
    assert!(s.is_inclusive(&a));
    assert!(s.is_inclusive(&b));
    assert!(!s.is_inclusive(&root));
    assert_eq!(s.inclusive_count(), 2);
    assert!(s.open_tip(&root.thread_id).is_some());
}

#[test]
fn test_reply_shape() {
    let mut s = sim(6, 4);
    let root = s.create_root().unwrap().clone();
    let reply = s.reply_to(&root).unwrap().clone();

    assert_eq!(reply.kind, MessageKind::Reply);
    assert_eq!(reply.subject, format!("Re: {}", root.subject));
    assert_eq!(reply.recipients, vec![root.sender.clone()]);
    assert!(root.recipients.contains(&reply.sender));
    assert!(!reply.cc.contains(&reply.sender));
    assert_eq!(reply.cc.len(), root.recipients.len().saturating_sub(1));
    assert_eq!(reply.parent_id.as_deref(), Some(root.message_id.as_str()));
    assert!(reply.body.contains(&format!(
        "On {}, {} wrote:",
        root.date.format("%Y-%m-%d %H:%M"),
        root.sender
    )));
    for line in root.body.split('\n') {
        assert!(reply.body.contains(&format!("> {line}")));
    }

    let again = s.reply_to(&reply).unwrap().clone();
    assert_eq!(again.subject, reply.subject);
    assert!(!again.subject.starts_with("Re: Re:"));
}

#[test]
fn test_reply_all_disabled() {
    let settings = SimulationSettings {
        reply_all: false,
        ..Default::default()
    };
    let mut s = ThreadSimulator::new(roster(6), settings).unwrap().with_seed(2);
    let root = s.create_root().unwrap().clone();
    let reply = s.reply_to(&root).unwrap().clone();
    assert!(reply.cc.is_empty());
}

#[test]
fn test_forward_shape() {
    let mut s = sim(10, 8);
    let root_id = s.create_root().unwrap().message_id.clone();
    let att = Arc::new(Attachment::new(
        Uuid::nil(),
        "plan.pdf",
        "/tmp/plan.pdf",
        "application/pdf",
    ));
    let idx = s.by_message_id[&root_id];
    s.messages[idx].add_attachment(att.clone());
    let root = s.messages[idx].clone();

    let fwd = s.forward(&root).unwrap().clone();
    assert_eq!(fwd.kind, MessageKind::Forward);
    assert_ne!(fwd.thread_id, root.thread_id);
    assert_eq!(fwd.parent_id.as_deref(), Some(root.message_id.as_str()));
    assert_eq!(fwd.references, vec![root.message_id.clone()]);
    assert_eq!(fwd.subject, format!("Fwd: {}", root.subject));
    assert!(fwd.body.contains("---------- Forwarded message ----------"));
    assert!(fwd.body.ends_with(&root.body));
    assert_eq!(fwd.recipients.len(), 1);

    let mut participants: Vec<&String> = root.recipients.iter().collect();
    participants.push(&root.sender);
    assert!(participants.contains(&&fwd.sender));
    assert!(!participants.contains(&&fwd.recipients[0]));

    assert_eq!(fwd.attachments.len(), 1);
    assert!(Arc::ptr_eq(&fwd.attachments[0], &att));
    assert_eq!(s.thread_ids().len(), 2);
}

#[test]
fn test_forward_rejected_without_new_recipients() {
    let mut s = sim(2, 1);
    let root = s.create_root().unwrap().clone();
    let err = s.forward(&root).unwrap_err();
    assert!(matches!(err, SimulationError::NoForwardRecipients { .. }));
    assert_eq!(s.messages().len(), 1);
}

#[test]
fn test_forward_downgraded_to_reply() {
    let settings = SimulationSettings {
        weights: ActionWeights {
            reply: 0.0,
            forward: 1.0,
            nothing: 0.0,
        },
        early_end_chance: 0.0,
        ..Default::default()
    };
    let mut s = ThreadSimulator::new(roster(2), settings)
        .unwrap()
        .with_seed(13);
    s.simulate(3).unwrap();

    assert!(s.messages().iter().all(|m| m.kind != MessageKind::Forward));
    assert!(s.messages().iter().any(|m| m.kind == MessageKind::Reply));
}

#[test]
fn test_idle_threads_end() {
    let settings = SimulationSettings {
        weights: ActionWeights {
            reply: 0.0,
            forward: 0.0,
            nothing: 1.0,
        },
        early_end_chance: 0.0,
        max_idle_ticks: 3,
        ..Default::default()
    };
    let mut s = ThreadSimulator::new(roster(4), settings).unwrap().with_seed(1);
    s.simulate(4).unwrap();
    assert_eq!(s.messages().len(), 4);
    assert!(s.messages().iter().all(|m| m.kind == MessageKind::New));
}

#[test]
fn test_subject_dedup() {
    let provider: Arc<dyn ContentProvider> = Arc::new(FixedProvider("Subject: Budget sync\n\nSee notes."));
    let mut s = sim(5, 17).with_provider(Some(provider));
    s.create_root().unwrap();
    s.create_root().unwrap();

    let used = s.used_subjects();
    assert_eq!(used.len(), 2);
    assert_eq!(used[0], "Budget sync");
    assert_ne!(used[1], used[0]);
    assert!(used[1].starts_with("Budget sync - "));
    assert_eq!(s.messages()[0].body, "See notes.");
}

#[test]
fn test_fallback_subject_dedup() {
    let topic = "vendor audit";
    let mut s = sim(5, 31).with_topic(Some(topic.into()));
    // more roots than openers, so some fallback subject repeats
    for _ in 0..8 {
        s.create_root().unwrap();
    }

    let used = s.used_subjects();
    assert_eq!(used.len(), 8);
    let mut suffixed = 0;
    for (i, subject) in used.iter().enumerate() {
        let earlier = &used[..i];
        match SUBJECT_SUFFIXES
            .iter()
            .find_map(|suffix| subject.strip_suffix(&format!(" {suffix}")))
        {
            Some(base) => {
                assert!(earlier.iter().any(|e| e == base), "{subject}");
                suffixed += 1;
            }
            None => {
                assert!(subject.ends_with(topic));
                assert!(!earlier.contains(subject), "{subject}");
            }
        }
    }
    assert!(suffixed >= 3);
}

#[test]
fn test_provider_failure_falls_back() {
    let provider: Arc<dyn ContentProvider> = Arc::new(FailingProvider);
    let mut s = sim(5, 23)
        .with_provider(Some(provider))
        .with_topic(Some("vendor audit".into()));
    s.simulate(5).unwrap();

    let root = &s.messages()[0];
    assert!(root.subject.ends_with("vendor audit"));
    assert!(root.body.starts_with("Hi all,\n\nI wanted to discuss vendor audit."));
}

#[test]
fn test_same_seed_same_run() {
    let mut a = sim(7, 99);
    let mut b = sim(7, 99);
    a.simulate(10).unwrap();
    b.simulate(10).unwrap();

    let ids_a: Vec<_> = a.messages().iter().map(|m| (&m.message_id, &m.subject)).collect();
    let ids_b: Vec<_> = b.messages().iter().map(|m| (&m.message_id, &m.subject)).collect();
    assert_eq!(ids_a, ids_b);
}

#[test]
fn test_preconditions() {
    assert!(matches!(
        ThreadSimulator::new(roster(1), SimulationSettings::default()),
        Err(SimulationError::RosterTooSmall { found: 1 })
    ));

    let mut s = sim(3, 0);
    assert!(matches!(s.simulate(0), Err(SimulationError::ZeroTarget)));
}

#[test]
fn test_roster_counts_distinct_emails() {
    let shared = vec![
        Persona::new("Ann One", "same@acme.com", "Analyst", "Finance"),
        Persona::new("Ann Two", "same@acme.com", "Director", "Legal"),
    ];
    assert!(matches!(
        ThreadSimulator::new(shared, SimulationSettings::default()),
        Err(SimulationError::RosterTooSmall { found: 1 })
    ));

    let ann = Persona::new("Ann Lee", "ann@acme.com", "Analyst", "Finance");
    assert!(matches!(
        ThreadSimulator::new(vec![ann.clone(), ann], SimulationSettings::default()),
        Err(SimulationError::RosterTooSmall { found: 1 })
    ));
}

#[test]
fn test_shared_email_never_self_addressed() {
    let mut people = roster(2);
    people.push(Persona::new("Other Name", "person0@acme.com", "CFO", "Finance"));
    let mut s = ThreadSimulator::new(people, SimulationSettings::default())
        .unwrap()
        .with_seed(4)
        .with_start_date(start());
    s.simulate(10).unwrap();

    for m in s.messages() {
        let from = display_email(&m.sender);
        assert!(m.recipients.iter().all(|r| display_email(r) != from), "{m:?}");
    }
}

#[test]
fn test_unknown_parent_rejected() {
    let mut a = sim(3, 1);
    let mut b = sim(3, 2);
    let foreign = a.create_root().unwrap().clone();
    assert!(matches!(
        b.reply_to(&foreign),
        Err(SimulationError::UnknownMessage(_))
    ));
}

#[test]
fn test_message_id_format() {
    let mut s = sim(3, 6);
    let m = s.create_root().unwrap();
    assert!(m.message_id.starts_with('<'));
    assert!(m.message_id.ends_with('>'));
    assert!(m.message_id.contains(&m.id.to_string()));
}
