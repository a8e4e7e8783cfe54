use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub const QUIZ_KEY_LENGTH: usize = 8;

pub fn generate_quiz_key() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(QUIZ_KEY_LENGTH)
        .map(char::from)
        .collect()
}
