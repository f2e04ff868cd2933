use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutfileError {
    #[error("io error on task {task_id} outfile: {source}")]
    Io {
        task_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("outfile for task {0} contains an unparsable line")]
    Corrupt(String),
}
