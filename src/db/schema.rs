diesel::table! {
    fingerprints (id) {
        id -> Int4,
        song_id -> Int4,
        #[max_length = 150]
        hash -> Varchar,
        offset -> Float8,
    }
}

diesel::table! {
    songs (id) {
        id -> Int4,
        #[max_length = 50]
        title -> Varchar,
        #[max_length = 50]
        artists -> Varchar,
        #[max_length = 50]
        album -> Varchar,
        #[max_length = 10000]
        lyrics -> Varchar,
        #[max_length = 500]
        cover -> Varchar,
        #[max_length = 500]
        url -> Varchar,
    }
}

diesel::joinable!(fingerprints -> songs (song_id));

diesel::allow_tables_to_appear_in_same_query!(fingerprints, songs,);
