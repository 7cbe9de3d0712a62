//! Development data set.
//!
//! Seeds a small catalogue, one administrator and one regular user, and
//! issues a personal access token for each account. Used by the
//! `dev-setup` binary and by the server when `seed_dev_data` is enabled.

use tracing::info;
use uuid::Uuid;

use super::auth::AccessToken;
use super::ports::{AccessTokenRepository, LinkageChange, ResourceRepository};
use super::registry::{ForeignKey, JoinTable};
use super::{
    AuthorDraft, BookDraft, CommentDraft, EntityDraft, Error, ResourceId, Role, UserDraft,
    sha256_hex,
};

/// Password given to every seeded account.
pub const DEV_PASSWORD: &str = "secret";
/// Display name stored with seeded tokens.
pub const DEV_TOKEN_NAME: &str = "Development Token";

const CATALOGUE: [(&str, [(&str, &str, &str); 2]); 3] = [
    (
        "Ursula K. Le Guin",
        [
            ("A Wizard of Earthsea", "A young mage learns the cost of power.", "1968"),
            ("The Dispossessed", "A physicist crosses between two worlds.", "1974"),
        ],
    ),
    (
        "Octavia E. Butler",
        [
            ("Kindred", "A writer is pulled back to antebellum Maryland.", "1979"),
            ("Parable of the Sower", "A young woman founds a faith amid collapse.", "1993"),
        ],
    ),
    (
        "Iain M. Banks",
        [
            ("Consider Phlebas", "A shapeshifter fights against the Culture.", "1987"),
            ("The Player of Games", "A game player is sent to a distant empire.", "1988"),
        ],
    ),
];

const ACCOUNTS: [(&str, &str, Role); 2] = [
    ("John Doe", "john@example.com", Role::Admin),
    ("Jane Doe", "jane@example.com", Role::User),
];

/// A seeded account and its freshly issued token.
#[derive(Debug, Clone)]
pub struct SeededUser {
    pub user_id: Uuid,
    pub name: &'static str,
    pub email: &'static str,
    pub role: Role,
    pub token: AccessToken,
}

/// Totals written by [`seed_dev_data`].
#[derive(Debug, Clone)]
pub struct SeedReport {
    pub authors: usize,
    pub books: usize,
    pub comments: usize,
    pub users: Vec<SeededUser>,
}

/// Write the development data set through the given ports.
///
/// # Errors
///
/// Returns the mapped repository error of the first failed write.
pub async fn seed_dev_data(
    resources: &dyn ResourceRepository,
    tokens: &dyn AccessTokenRepository,
) -> Result<SeedReport, Error> {
    let mut book_ids = Vec::new();
    for (name, books) in CATALOGUE {
        let mut written = Vec::with_capacity(books.len());
        for (title, description, year) in books {
            let draft = EntityDraft::Book(BookDraft {
                title: title.to_owned(),
                description: description.to_owned(),
                publication_year: year.to_owned(),
            });
            written.push(resources.insert(&draft, &[]).await?.id());
        }
        let draft = EntityDraft::Author(AuthorDraft {
            name: name.to_owned(),
        });
        let sync = LinkageChange::SyncJoin {
            join: JoinTable::AuthorBook,
            targets: written.clone(),
        };
        resources.insert(&draft, &[sync]).await?;
        book_ids.extend(written);
    }

    let mut users = Vec::with_capacity(ACCOUNTS.len());
    for (name, email, role) in ACCOUNTS {
        let draft = EntityDraft::User(UserDraft {
            name: name.to_owned(),
            email: email.to_owned(),
            password_digest: sha256_hex(DEV_PASSWORD),
            role,
        });
        let user = resources.insert(&draft, &[]).await?;
        let ResourceId::Uuid(user_id) = user.id() else {
            return Err(Error::internal("SeedError", "users must have UUID keys"));
        };
        let token = AccessToken::generate();
        tokens.issue(user_id, DEV_TOKEN_NAME, &token.digest()).await?;
        users.push(SeededUser {
            user_id,
            name,
            email,
            role,
            token,
        });
    }

    let mut comments = 0;
    if let Some(reader) = users.last() {
        for book_id in &book_ids {
            let draft = EntityDraft::Comment(CommentDraft {
                message: "Couldn't put it down.".to_owned(),
            });
            let linkage = [
                LinkageChange::AssignOwner {
                    foreign_key: ForeignKey::CommentBook,
                    target: Some(*book_id),
                },
                LinkageChange::AssignOwner {
                    foreign_key: ForeignKey::CommentUser,
                    target: Some(ResourceId::Uuid(reader.user_id)),
                },
            ];
            resources.insert(&draft, &linkage).await?;
            comments += 1;
        }
    }

    info!(
        authors = CATALOGUE.len(),
        books = book_ids.len(),
        comments,
        "development data seeded"
    );
    Ok(SeedReport {
        authors: CATALOGUE.len(),
        books: book_ids.len(),
        comments,
        users,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::ports::ListQuery;
    use crate::domain::registry::RelationshipMechanism;
    use crate::domain::{ResourceType, digest_token};
    use crate::outbound::memory::{MemoryAccessTokens, MemoryResourceStore};
    use rstest::rstest;

    fn everything() -> ListQuery {
        ListQuery {
            filters: Vec::new(),
            sort: Vec::new(),
            offset: 0,
            limit: 100,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn seeds_catalogue_accounts_and_tokens() {
        let store = Arc::new(MemoryResourceStore::default());
        let tokens = MemoryAccessTokens::new(Arc::clone(&store));

        let report = seed_dev_data(store.as_ref(), &tokens)
            .await
            .expect("seeding succeeds");

        assert_eq!(report.authors, 3);
        assert_eq!(report.books, 6);
        assert_eq!(report.comments, 6);
        let names: Vec<&str> = report.users.iter().map(|user| user.name).collect();
        assert_eq!(names, ["John Doe", "Jane Doe"]);

        let listing = store
            .list(ResourceType::Books, &everything())
            .await
            .expect("books listed");
        assert_eq!(listing.total, 6);

        for user in &report.users {
            let actor = tokens
                .find_actor(&digest_token(user.token.as_str()))
                .await
                .expect("lookup succeeds")
                .expect("token resolves");
            assert_eq!(actor.user_id(), user.user_id);
            assert_eq!(actor.role(), user.role);
        }
    }

    #[rstest]
    #[tokio::test]
    async fn every_seeded_author_has_two_books() {
        let store = Arc::new(MemoryResourceStore::default());
        let tokens = MemoryAccessTokens::new(Arc::clone(&store));
        seed_dev_data(store.as_ref(), &tokens)
            .await
            .expect("seeding succeeds");

        let authors = store
            .list(ResourceType::Authors, &everything())
            .await
            .expect("authors listed");
        for author in authors.items {
            let books = store
                .related(author.key(), RelationshipMechanism::ManyToMany(JoinTable::AuthorBook))
                .await
                .expect("related books");
            assert_eq!(books.len(), 2);
        }
    }
}
