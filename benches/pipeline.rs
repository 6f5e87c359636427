use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::path::Path;

use replytrack::analysis::{keywords, reply_type, trim_reply_junk};

const BODY: &str = "承知しました。納期とスケジュールを確認のうえ、見積を修正します。\n\
本日中に差し替え版をお送りします。\n\
\n\
On Mon, 10 Mar 2025 at 10:00, Client <client@example.com> wrote:\n\
> 至急お願いします。\n\
> 前回の見積について質問があります。\n";

fn bench_trim_and_classify(c: &mut Criterion) {
    c.bench_function("trim_reply_junk", |b| {
        b.iter(|| trim_reply_junk(black_box(BODY)))
    });

    let trimmed = trim_reply_junk(BODY);
    c.bench_function("classify_reply", |b| {
        b.iter(|| {
            let kind = reply_type(black_box("Re: 見積のご相談"), black_box(&trimmed));
            let words = keywords(black_box("Re: 見積のご相談"), black_box(&trimmed));
            (kind, words)
        })
    });
}

fn bench_open_mailbox(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("replies.mbox");
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");

    c.bench_function("open_fixture_mailbox", |b| {
        b.iter(|| {
            replytrack::mailbox::mbox::MboxMailbox::open(&fixture_path, &state)
                .unwrap()
                .conversation_count()
        })
    });
}

criterion_group!(benches, bench_trim_and_classify, bench_open_mailbox);
criterion_main!(benches);
