use sea_orm::{EntityTrait, QuerySelect, Select, sea_query::LockType};

/// `SELECT ... FOR UPDATE` on an entity select.
///
/// Every payment- or wallet-mutating transaction locks its row before
/// inspecting state, so concurrent attempts serialize and exactly one wins.
pub trait LockForUpdate {
    fn for_update(self) -> Self;
}

impl<E> LockForUpdate for Select<E>
where
    E: EntityTrait,
{
    fn for_update(self) -> Self {
        QuerySelect::lock(self, LockType::Update)
    }
}
