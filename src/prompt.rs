use std::io::{self, BufRead, Write};


fn ask(input: &mut impl BufRead, output: &mut impl Write, question: &str) -> io::Result<String> {
    write!(output, "{question}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed before an answer was given"));
    }
    Ok(line.trim().to_string())
}


/// Asks for a search term until a non-blank one is entered.
pub(crate) fn search_term(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<String> {
    loop {
        let term = ask(input, output, "Enter the job search term (e.g. 'Data Scientist'): ")?;
        if !term.is_empty() {
            return Ok(term);
        }
        writeln!(output, "The search term cannot be empty.")?;
    }
}


/// Asks how many listings to scrape until a positive number is entered. A blank answer takes `default`.
pub(crate) fn job_count(input: &mut impl BufRead, output: &mut impl Write, default: u32) -> io::Result<u32> {
    loop {
        let answer = ask(input, output, &format!("Enter the number of jobs to scrape [{default}]: "))?;
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse::<u32>() {
            Ok(count) if count > 0 => return Ok(count),
            _ => writeln!(output, "Please enter a positive whole number.")?
        }
    }
}
