//! Interactive question loop for terminal use.
use std::io::{self, BufRead, Write};

use tracing::error;

use crate::embedder::Embedder;
use crate::pipeline::RetrievalPipeline;

/// Read questions from `input` until EOF or `exit`/`quit`, writing answers
/// to `out`. A failed answer is reported and the loop keeps going.
pub fn run<E, R, W>(pipeline: &RetrievalPipeline<'_, E>, input: R, mut out: W) -> io::Result<()>
where
    E: Embedder + ?Sized,
    R: BufRead,
    W: Write,
{
    writeln!(out, "\nREADY: Type a question about an error (or 'exit' to quit).")?;

    let mut lines = input.lines();
    loop {
        write!(out, "Q> ")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out, "\nExiting.")?;
            break;
        };
        let question = line?;
        let question = question.trim();

        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            writeln!(out, "Bye.")?;
            break;
        }

        match pipeline.answer(question) {
            Ok(answer) => writeln!(out, "\n{answer}\n")?,
            Err(e) => {
                error!("Failed to answer {question:?}: {e}");
                writeln!(out, "Failed to answer the question: {e}")?;
            }
        }
    }

    Ok(())
}
