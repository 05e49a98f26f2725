//! The background worker translating submitted texts over HTTP.

mod common;

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::*;
use lexicard::config::{GatewayConfig, JobConfig};
use lexicard::job::LogNotifier;
use lexicard::model::NewActivity;
use lexicard::{Database, HttpGateway, JobQueue, TextIngestor, TranslationJob, TranslationWorker};

/// Answers every request on `listener` with `body` until `count`
/// requests were served.
fn serve(listener: TcpListener, body: &'static str, count: usize) -> thread::JoinHandle<usize> {
    thread::spawn(move || {
        let mut served = 0;
        for stream in listener.incoming().take(count) {
            let mut stream = stream.unwrap();
            read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            served += 1;
        }
        served
    })
}

/// Reads headers and the announced body so the client never sees a reset.
fn read_request(stream: &mut TcpStream) {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            return;
        }
        data.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&data);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                return;
            }
        }
    }
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    done()
}

#[test]
fn test_worker_translates_submitted_text() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/processhtml", listener.local_addr().unwrap());
    let server = serve(
        listener,
        r#"[["Hola", "hola", "INTJ", null, 3, "Hello"], ["mundo", "mundo", "NOUN", null, 8, "world"]]"#,
        1,
    );

    let db = Database::open_in_memory().unwrap();
    let queue = Arc::new(JobQueue::new());
    let gateway = HttpGateway::new(&GatewayConfig {
        endpoint,
        connect_timeout_secs: 2,
        request_timeout_secs: 5,
    })
    .unwrap();
    let job = TranslationJob::new(
        db.clone(),
        Arc::new(gateway),
        queue.clone(),
        Arc::new(LogNotifier),
        JobConfig::default(),
    );
    let worker = TranslationWorker::start(job, queue.clone()).unwrap();

    let ingestor = TextIngestor::new(db.clone(), queue.clone(), JobConfig::default());
    let activity = ingestor
        .create_activity(
            &NewActivity {
                name: "Spanish".to_string(),
                source_lang: "es".to_string(),
                target_lang: "en".to_string(),
                creator_id: 3,
            },
            &["<p>Hola mundo</p>".to_string()],
        )
        .unwrap();

    let translated = wait_until(Duration::from_secs(5), || {
        ingestor.translation_status(activity.id).unwrap() == lexicard::ActivityStatus::Ready
    });
    assert!(translated, "text was not translated in time");

    let texts = ingestor.list_texts(activity.id).unwrap();
    let words = lexicard::db::word_repo::list_for_text(&db, texts[0].text.id).unwrap();
    assert_eq!(words.len(), 2);
    for word in &words {
        assert_eq!(word.surface_in(&texts[0].text.body), Some(word.source_raw.as_str()));
    }

    worker.shutdown();
    assert!(worker.is_shutdown());
    worker.wait();
    assert_eq!(server.join().unwrap(), 1);
}

#[test]
fn test_closed_queue_rejects_new_runs() {
    let h = TestHarness::new();
    let queue = Arc::new(JobQueue::new());
    let job = h.job();
    let worker = TranslationWorker::start(job, queue.clone()).unwrap();
    worker.shutdown();
    worker.wait();

    // submissions still succeed; the text waits for the next worker
    let ingestor = TextIngestor::new(h.db.clone(), queue.clone(), h.config.clone());
    let activity = h.create_activity(1);
    let text_id = ingestor.submit_text(activity.id, "later").unwrap();
    assert!(queue.is_empty());
    assert!(!h.text(text_id).translated);
}
