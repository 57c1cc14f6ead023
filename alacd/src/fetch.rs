use crate::{Error, Result, utils};
use bytes::Bytes;
use log::debug;
use rayon::prelude::*;
use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    header,
};

/// Half-open byte range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Value of the `Range` request header, which is inclusive.
    pub fn as_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end - 1)
    }
}

/// Split `size` bytes into `n` contiguous ranges, the last one absorbing the remainder.
pub fn split(size: u64, n: usize) -> Vec<Range> {
    if size == 0 {
        return vec![];
    }

    let n = (n as u64).clamp(1, size);
    let block = size / n;

    (0..n)
        .map(|i| Range {
            start: i * block,
            end: if i == n - 1 { size } else { (i + 1) * block },
        })
        .collect()
}

/// What a `HEAD` request tells about a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Probe {
    pub size: Option<u64>,
    pub ranges: bool,
}

/// Downloads a resource with parallel range requests when the server allows it.
#[derive(Clone, Debug)]
pub struct RangedFetcher {
    client: Client,
    threads: usize,
    retries: u8,
}

impl RangedFetcher {
    pub fn new(client: Client, threads: usize, retries: u8) -> Self {
        Self {
            client,
            threads: threads.max(1),
            retries,
        }
    }

    pub fn probe(&self, url: &str) -> Result<Probe> {
        self.execute(
            || self.client.head(url),
            |response| {
                let headers = response.headers();
                let size = headers
                    .get(header::CONTENT_LENGTH)
                    .and_then(|x| x.to_str().ok())
                    .and_then(|x| x.parse::<u64>().ok());
                let ranges = headers
                    .get(header::ACCEPT_RANGES)
                    .and_then(|x| x.to_str().ok())
                    .is_some_and(|x| x.eq_ignore_ascii_case("bytes"));

                Ok(Probe { size, ranges })
            },
        )
    }

    /// Download the whole resource.
    pub fn fetch(&self, url: &str) -> Result<Bytes> {
        let probe = self.probe(url)?;

        let size = match probe {
            Probe {
                size: Some(size),
                ranges: true,
            } if size > 0 => size,
            _ => {
                debug!("downloading {} with a single request", url);
                return self.execute(|| self.client.get(url), |x| x.bytes());
            }
        };

        let ranges = split(size, self.threads);
        debug!(
            "downloading {} ({}) in {} ranges",
            url,
            utils::format_bytes(size as usize),
            ranges.len()
        );

        let mut buffer = vec![0_u8; size as usize];
        let mut regions = Vec::with_capacity(ranges.len());
        let mut rest = buffer.as_mut_slice();

        for range in &ranges {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len() as usize);
            regions.push((range, head));
            rest = tail;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(ranges.len())
            .build()
            .map_err(Error::fetch)?;

        pool.install(|| {
            regions
                .into_par_iter()
                .try_for_each(|(range, region)| self.fetch_range(url, range, region))
        })?;

        Ok(Bytes::from(buffer))
    }

    fn fetch_range(&self, url: &str, range: &Range, region: &mut [u8]) -> Result<()> {
        let data = self.execute(
            || {
                self.client
                    .get(url)
                    .header(header::RANGE, range.as_header_value())
            },
            |x| x.bytes(),
        )?;

        if data.len() != region.len() {
            return Err(Error::Fetch(format!(
                "{} returned {} bytes for range {} (expected {})",
                url,
                data.len(),
                range.as_header_value(),
                region.len()
            )));
        }

        region.copy_from_slice(&data);
        Ok(())
    }

    /// Send a request, retrying connection errors and timeouts.
    fn execute<T, B, R>(&self, build: B, read: R) -> Result<T>
    where
        B: Fn() -> RequestBuilder,
        R: Fn(Response) -> reqwest::Result<T>,
    {
        let mut attempt = 0;

        loop {
            let result = build()
                .send()
                .and_then(|x| x.error_for_status())
                .and_then(&read);

            match result {
                Ok(value) => return Ok(value),
                Err(e) if utils::is_transient(&e) => {
                    if attempt >= self.retries {
                        return Err(Error::Fetch(format!(
                            "{} after {} retries",
                            utils::describe(&e),
                            self.retries
                        )));
                    }

                    attempt += 1;
                    debug!("retrying {} [{}/{}]", utils::describe(&e), attempt, self.retries);
                }
                Err(e) => return Err(Error::Fetch(utils::describe(&e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_last_range() {
        assert_eq!(
            split(10, 3),
            vec![
                Range { start: 0, end: 3 },
                Range { start: 3, end: 6 },
                Range { start: 6, end: 10 },
            ]
        );
    }

    #[test]
    fn ranges_cover_every_byte() {
        for (size, n) in [(1, 1), (7, 7), (1000, 10), (1001, 10), (5, 32)] {
            let ranges = split(size, n);

            assert_eq!(ranges.first().map(|x| x.start), Some(0));
            assert_eq!(ranges.last().map(|x| x.end), Some(size));
            assert!(ranges.windows(2).all(|x| x[0].end == x[1].start));
            assert!(ranges.iter().all(|x| !x.is_empty()));
            assert_eq!(ranges.iter().map(Range::len).sum::<u64>(), size);
        }
    }

    #[test]
    fn more_threads_than_bytes() {
        assert_eq!(split(3, 10).len(), 3);
        assert!(split(0, 4).is_empty());
    }

    #[test]
    fn header_value_is_inclusive() {
        assert_eq!(Range { start: 0, end: 100 }.as_header_value(), "bytes=0-99");
        assert_eq!(
            Range {
                start: 100,
                end: 101
            }
            .as_header_value(),
            "bytes=100-100"
        );
    }
}
