use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use waitlist_eng::probability::binomial_tail;
use waitlist_eng::{RegistrationId, Role, Strategy, Submission, TicketBook, TicketConfig};

/// Generates submissions for one ticket.
///
/// Pattern (repeating): leader, leader, follower, couple.
/// Leaders outnumber followers so the waiting list fills up.
pub struct SubmissionGenerator {
    next_id: RegistrationId,
    remaining: u32,
    step: u32,
}

impl SubmissionGenerator {
    pub fn new(count: u32) -> Self {
        Self {
            next_id: 1,
            remaining: count,
            step: 0,
        }
    }
}

impl Iterator for SubmissionGenerator {
    type Item = Submission;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let id = self.next_id;
        let submission = match self.step % 4 {
            0 | 1 => Submission::Solo {
                id,
                role: Role::Leader,
            },
            2 => Submission::Solo {
                id,
                role: Role::Follower,
            },
            _ => {
                self.next_id += 1;
                Submission::Couple {
                    id,
                    partner: id + 1,
                    role: Role::Leader,
                }
            }
        };
        self.next_id += 1;
        self.step += 1;

        Some(submission)
    }
}

fn filled_book(config: TicketConfig, count: u32) -> TicketBook {
    let mut book = TicketBook::new("bench", config).unwrap();
    for submission in SubmissionGenerator::new(count) {
        let _ = book.admit(submission);
    }
    book
}

fn bench_admissions(c: &mut Criterion) {
    let mut group = c.benchmark_group("admissions");

    // registrations well past capacity, so most end up waiting
    for (capacity, count) in [(50, 100), (200, 400), (500, 1_000)] {
        let label = format!("{capacity}cap_{count}reg");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(capacity, count),
            |b, &(capacity, count)| {
                b.iter(|| {
                    let config = TicketConfig::new(capacity, 1.5).with_allow_first(capacity / 5);
                    black_box(filled_book(config, count))
                });
            },
        );
    }

    group.finish();
}

fn bench_probabilistic_admissions(c: &mut Criterion) {
    let mut group = c.benchmark_group("probabilistic_admissions");

    for capacity in [50u32, 200, 500] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let config =
                        TicketConfig::new(capacity, 1.5).with_strategy(Strategy::probabilistic());
                    black_box(filled_book(config, capacity * 2))
                });
            },
        );
    }

    group.finish();
}

fn bench_rebalance_after_cancellations(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebalance");

    for capacity in [50u32, 200, 500] {
        let config = TicketConfig::new(capacity, 1.5).with_allow_first(capacity / 5);
        let book = filled_book(config, capacity * 2);
        let accepted: Vec<_> = book
            .ledger()
            .iter()
            .filter(|r| r.active && !r.waiting && !r.is_paired())
            .map(|r| r.id)
            .take(capacity as usize / 10)
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &accepted,
            |b, accepted| {
                b.iter(|| {
                    let mut book = book.clone();
                    for id in accepted {
                        let _ = black_box(book.cancel(*id));
                    }
                    book
                });
            },
        );
    }

    group.finish();
}

fn bench_binomial_tail(c: &mut Criterion) {
    let mut group = c.benchmark_group("binomial_tail");

    for n in [10u64, 1_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| binomial_tail(black_box(n / 3), black_box(n), black_box(0.4)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_admissions,
    bench_probabilistic_admissions,
    bench_rebalance_after_cancellations,
    bench_binomial_tail
);
criterion_main!(benches);
