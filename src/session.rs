//! Read-only IMAP mailbox reader
//!
//! [`ImapReader`] holds connection parameters; [`ImapReader::connect`]
//! yields a [`MailSession`], the connected state. Queries run on the
//! session and [`MailSession::disconnect`] consumes it, so a query can
//! never run on a closed connection.

use crate::config::ImapConfig;
use crate::connection::{self, ImapSession, transport_or_protocol};
use crate::criterion::SearchCriterion;
use crate::error::{Error, Result, server_reason};
use crate::mailbox::MailboxName;
use crate::message::Message;
use futures::StreamExt;
use tracing::{debug, info, warn};

/// Read-only IMAP client
///
/// Cheap to keep around: it opens no connection until asked. The
/// one-shot helpers connect, run a single query and disconnect, so
/// each call is independent of every other.
pub struct ImapReader {
    config: ImapConfig,
}

impl ImapReader {
    #[must_use]
    pub const fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ImapConfig {
        &self.config
    }

    /// Open and authenticate a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connectivity`] if the server cannot be reached
    /// or TLS fails, [`Error::Protocol`] on a malformed greeting, and
    /// [`Error::Authentication`] if the credentials are rejected.
    pub async fn connect(&self) -> Result<MailSession> {
        let session = connection::connect(&self.config).await?;
        Ok(MailSession {
            session,
            selected: None,
        })
    }

    /// Fetch every message in a mailbox, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, EXAMINE, SEARCH or FETCH fails.
    pub async fn fetch_all(&self, mailbox: &MailboxName) -> Result<Vec<Message>> {
        self.run(&SearchCriterion::All, mailbox, None).await
    }

    /// Fetch the `n` most recent messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, EXAMINE, SEARCH or FETCH fails.
    pub async fn fetch_last_n(&self, mailbox: &MailboxName, n: usize) -> Result<Vec<Message>> {
        self.run(&SearchCriterion::All, mailbox, Some(n)).await
    }

    /// Fetch the most recent message, if the mailbox has any.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, EXAMINE, SEARCH or FETCH fails.
    pub async fn fetch_latest(&self, mailbox: &MailboxName) -> Result<Option<Message>> {
        Ok(self.fetch_last_n(mailbox, 1).await?.into_iter().next())
    }

    /// Run one search criterion against a mailbox, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, EXAMINE, SEARCH or FETCH fails.
    pub async fn search(
        &self,
        mailbox: &MailboxName,
        criterion: &SearchCriterion,
    ) -> Result<Vec<Message>> {
        self.run(criterion, mailbox, None).await
    }

    async fn run(
        &self,
        criterion: &SearchCriterion,
        mailbox: &MailboxName,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        let mut session = self.connect().await?;
        let result = session.query(criterion, mailbox, limit).await;

        // The query outcome is what the caller asked for; a failed
        // logout is only reported.
        if let Err(e) = session.disconnect().await {
            warn!("Disconnect after query failed: {}", e);
        }

        result
    }
}

/// A connected, authenticated IMAP session.
///
/// Holds at most one selected mailbox and runs one command at a time.
pub struct MailSession {
    session: ImapSession,
    selected: Option<MailboxName>,
}

impl MailSession {
    /// Open a mailbox read-only (EXAMINE) and return its message count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MailboxNotFound`] if the server refuses the
    /// mailbox.
    pub async fn select_mailbox(&mut self, mailbox: &MailboxName) -> Result<u32> {
        self.selected = None;
        let exists = connection::examine(&mut self.session, mailbox).await?;
        self.selected = Some(mailbox.clone());
        Ok(exists)
    }

    /// Search a mailbox and fetch the matches, newest first.
    ///
    /// With `limit`, only the newest `limit` matches are fetched;
    /// `Some(0)` returns nothing without touching the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MailboxNotFound`] for an unknown mailbox,
    /// [`Error::Protocol`] or [`Error::Connectivity`] if SEARCH fails,
    /// and [`Error::Fetch`] if any matched message cannot be fetched.
    pub async fn query(
        &mut self,
        criterion: &SearchCriterion,
        mailbox: &MailboxName,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        if limit == Some(0) {
            return Ok(vec![]);
        }

        self.select_mailbox(mailbox).await?;

        let mut uids = self.search(criterion).await?;
        if uids.is_empty() {
            return Ok(vec![]);
        }

        if let Some(n) = limit {
            let start = uids.len().saturating_sub(n);
            uids = uids.split_off(start);
        }

        let mut messages = self.fetch_and_parse(&uids).await?;
        messages.reverse();
        Ok(messages)
    }

    /// All messages in INBOX, or the newest `limit` of them.
    ///
    /// # Errors
    ///
    /// See [`MailSession::query`].
    pub async fn query_all(&mut self, limit: Option<usize>) -> Result<Vec<Message>> {
        self.query(&SearchCriterion::All, &MailboxName::Inbox, limit)
            .await
    }

    /// INBOX messages whose subject contains `text`.
    ///
    /// # Errors
    ///
    /// See [`MailSession::query`].
    pub async fn query_by_subject(&mut self, text: &str) -> Result<Vec<Message>> {
        self.query(&SearchCriterion::subject(text), &MailboxName::Inbox, None)
            .await
    }

    /// INBOX messages whose body contains `text`.
    ///
    /// # Errors
    ///
    /// See [`MailSession::query`].
    pub async fn query_by_body(&mut self, text: &str) -> Result<Vec<Message>> {
        self.query(&SearchCriterion::body(text), &MailboxName::Inbox, None)
            .await
    }

    /// INBOX messages sent on or after the date of an ISO 8601 timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDate`] before any command is sent if the
    /// timestamp is malformed; otherwise see [`MailSession::query`].
    pub async fn query_by_sent_since(&mut self, iso: &str) -> Result<Vec<Message>> {
        let criterion = SearchCriterion::sent_since(iso)?;
        self.query(&criterion, &MailboxName::Inbox, None).await
    }

    /// Close the selected mailbox (if any) and log out.
    ///
    /// LOGOUT is attempted even when CLOSE fails; the first failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if CLOSE or LOGOUT fails.
    pub async fn disconnect(mut self) -> Result<()> {
        let closed = if self.selected.take().is_some() {
            self.session
                .close()
                .await
                .map_err(|e| transport_or_protocol(&e))
        } else {
            Ok(())
        };

        let logged_out = self
            .session
            .logout()
            .await
            .map_err(|e| transport_or_protocol(&e));

        closed.and(logged_out)?;
        info!("Disconnected from IMAP server");
        Ok(())
    }

    // -- private helpers --

    /// UIDs matching `criterion` in the selected mailbox, ascending.
    async fn search(&mut self, criterion: &SearchCriterion) -> Result<Vec<u32>> {
        let query = criterion.to_query();

        let uids = self
            .session
            .uid_search(&query)
            .await
            .map_err(|e| match e {
                async_imap::error::Error::No(_) => {
                    Error::Protocol(format!("Search refused: {}", server_reason(&e)))
                }
                other => transport_or_protocol(&other),
            })?;

        let mut uid_list: Vec<u32> = uids.into_iter().collect();
        uid_list.sort_unstable();

        info!("Found {} messages matching '{}'", uid_list.len(), query);
        Ok(uid_list)
    }

    /// Fetch and parse each UID in order. The first failure aborts the
    /// whole batch.
    async fn fetch_and_parse(&mut self, uids: &[u32]) -> Result<Vec<Message>> {
        let mut messages = Vec::with_capacity(uids.len());
        for uid in uids {
            messages.push(self.fetch_single(*uid).await?);
        }
        Ok(messages)
    }

    async fn fetch_single(&mut self, uid: u32) -> Result<Message> {
        debug!(uid, "Fetching message");

        let mut fetches = self
            .session
            .uid_fetch(uid.to_string(), "(BODY.PEEK[])")
            .await
            .map_err(|e| Error::Fetch(format!("UID {uid}: {}", server_reason(&e))))?;

        let mut raw = None;
        while let Some(item) = fetches.next().await {
            let fetch = item.map_err(|e| Error::Fetch(format!("UID {uid}: {}", server_reason(&e))))?;
            if raw.is_none() && fetch.uid.is_none_or(|u| u == uid) {
                raw = fetch.body().map(<[u8]>::to_vec);
            }
        }
        drop(fetches);

        let raw = raw.ok_or_else(|| Error::Fetch(format!("No message returned for UID {uid}")))?;
        Message::parse(uid, &raw).map_err(|e| Error::Fetch(format!("UID {uid}: {e}")))
    }
}
